//! annograph-import library interface
//!
//! Projects discourses into an anchor/span graph plus a relational side-index,
//! and keeps the per-corpus state that ties imports together.

pub mod acoustics;
pub mod corpus;
pub mod db;
pub mod error;
pub mod graph;
pub mod lexicon;
pub mod projection;
pub mod state;

pub use crate::corpus::{CorpusContext, ImportSummary};
pub use crate::error::{ImportError, ImportResult};
pub use crate::graph::{CypherScriptStore, GraphStore, MemoryGraphStore};
pub use crate::lexicon::{Lexicon, WordKey, WordToken};
pub use crate::projection::{project_discourse, DiscourseProjection};
pub use crate::state::CorpusState;
