//! Projection of one discourse into graph and relational form
//!
//! Projection is pure: it reads the tiers, updates a lexicon the caller owns,
//! and returns everything the two stores need. Every fatal error (hierarchy,
//! tier configuration, property mismatch) surfaces here, before either store
//! is written.

pub mod anchors;
pub mod spans;
pub mod tokens;

pub use anchors::AnchorIndex;
pub use spans::{SpanBuilder, SpanProjection};
pub use tokens::{project_tokens, TokenProjection, TRANSCRIPTION_PROPERTY};

use crate::error::ImportResult;
use crate::graph::GraphBatch;
use crate::lexicon::{AttributeScope, Lexicon, WordKey, WordToken};
use annograph_common::{Attribute, DiscourseData, PropertyValue};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::info;

/// Word type row for the relational side-index
#[derive(Debug, Clone, PartialEq)]
pub struct WordRow {
    pub key: WordKey,
    /// Occurrences in this discourse
    pub frequency: u64,
    /// Explicit type properties
    pub properties: BTreeMap<String, PropertyValue>,
}

/// Everything the relational store receives for one discourse
#[derive(Debug, Clone, Default)]
pub struct RelationalRows {
    pub discourse: String,
    pub words: Vec<WordRow>,
    pub inventory: BTreeMap<String, BTreeSet<String>>,
    pub sound_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DiscourseProjection {
    pub graph: GraphBatch,
    pub relational: RelationalRows,
    pub tokens: Vec<WordToken>,
    pub is_timed: bool,
    /// Entries dropped per tier for lack of a resolvable extent
    pub dropped: BTreeMap<String, usize>,
}

/// Storage name of a property key: a tier's attribute name when the key names
/// a tier, else the sanitized key
pub(crate) fn property_name(data: &DiscourseData, key: &str) -> String {
    match data.get(key) {
        Some(tier) => tier.attribute.name.clone(),
        None => Attribute::sanitize_name(key),
    }
}

fn register_attributes(data: &DiscourseData, lexicon: &mut Lexicon) {
    for tier in data.tiers().iter().filter(|t| !t.ignored) {
        let scope = if tier.token {
            AttributeScope::Token
        } else {
            AttributeScope::Type
        };
        lexicon.register_attribute(scope, tier.attribute.clone());
    }
}

pub fn project_discourse(data: &DiscourseData, corpus: &str, lexicon: &mut Lexicon) -> ImportResult<DiscourseProjection> {
    data.validate_hierarchy()?;
    for tier in data.tiers() {
        tier.validate()?;
    }
    let order = data.process_order()?;

    register_attributes(data, lexicon);
    let token_pass = project_tokens(data, lexicon)?;

    let anchors = AnchorIndex::build(data);
    let is_timed = anchors.is_timed();
    let span_pass = SpanBuilder::new(data, &anchors).build(&order);

    let graph = GraphBatch {
        corpus: corpus.to_string(),
        discourse: data.name.clone(),
        anchors: anchors.into_nodes(),
        spans: span_pass.spans,
        types: span_pass.types,
        token_properties: span_pass.token_properties,
        type_properties: span_pass.type_properties,
        hierarchy: span_pass.hierarchy,
    };
    let relational = RelationalRows {
        discourse: data.name.clone(),
        words: token_pass.words,
        inventory: token_pass.inventory,
        sound_file: data.wav_path.clone(),
    };

    info!(
        "Projected discourse '{}': {} anchors, {} spans, {} tokens of {} word types",
        data.name,
        graph.anchors.len(),
        graph.spans.len(),
        token_pass.tokens.len(),
        relational.words.len()
    );

    Ok(DiscourseProjection {
        graph,
        relational,
        tokens: token_pass.tokens,
        is_timed,
        dropped: span_pass.dropped,
    })
}
