//! # annograph common library
//!
//! In-memory model shared by the annograph crates:
//! - Attributes with inferred kinds and running ranges
//! - Segments, annotations and their property bags
//! - Tier configuration and the transcription tokenizer
//! - Per-discourse hierarchy composition and speaker merging
//! - Configuration loading

pub mod annotation;
pub mod attribute;
pub mod config;
pub mod discourse;
pub mod error;
pub mod tier;
pub mod transcription;

pub use annotation::{Annotation, PropertyValue, Reference, Segment, TierEntry};
pub use attribute::{Attribute, AttributeKind, AttributeType};
pub use discourse::DiscourseData;
pub use error::{Error, Result};
pub use tier::{AnnotationType, NumberBehavior};
pub use transcription::parse_transcription;
