//! Graph projection model
//!
//! One discourse projects into:
//! - **anchors**: time- or order-indexed points, unique per discourse
//! - **spans**: typed edges between two anchors, one per tier entry, linked to the
//!   containing span of the supertype tier
//! - **type nodes**: corpus-scoped, one per (annotation type, label, type
//!   properties); every span has an `is_a` link to one
//!
//! Nothing here talks to a store. [`store::GraphStore`] is the boundary.

pub mod cypher;
pub mod store;

use annograph_common::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

pub use store::{CypherScriptStore, DiscourseGraph, GraphStore, MemoryGraphStore};

/// Label shared by all anchor nodes
pub const ANCHOR_LABEL: &str = "Anchor";

/// Graph type name of the word-anchor tier
pub const WORD_TYPE: &str = "word";

/// Graph store errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// A uniqueness constraint active during the load was violated
    #[error("Uniqueness constraint on :{label}({property}) violated by value {value}")]
    ConstraintViolation {
        label: String,
        property: String,
        value: String,
    },

    /// The discourse is already loaded and must be removed first
    #[error("Discourse '{discourse}' already exists in corpus '{corpus}'")]
    DiscourseExists { corpus: String, discourse: String },

    /// A span points at an anchor the batch does not contain
    #[error("Span {span} references missing anchor {anchor}")]
    MissingAnchor { span: Uuid, anchor: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordering key of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKey {
    Time(f64),
    Index(u64),
}

impl AnchorKey {
    pub fn as_f64(&self) -> f64 {
        match self {
            AnchorKey::Time(t) => *t,
            AnchorKey::Index(i) => *i as f64,
        }
    }
}

/// Point in a discourse that spans attach to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorNode {
    /// Unique within the discourse; increases with `key`
    pub id: u64,
    pub key: AnchorKey,
    /// Label of the primary base segment starting here, empty at the end
    pub label: String,
}

/// Natural key of a type node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeKey {
    pub annotation_type: String,
    pub label: String,
    /// Canonical JSON of the type properties
    pub properties: String,
}

/// Corpus-scoped type node carrying type-level properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeNode {
    pub key: TypeKey,
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl TypeNode {
    pub fn new(
        annotation_type: impl Into<String>,
        label: impl Into<String>,
        properties: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        let canonical = serde_json::Value::Object(
            properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )
        .to_string();
        Self {
            key: TypeKey {
                annotation_type: annotation_type.into(),
                label: label.into(),
                properties: canonical,
            },
            properties,
        }
    }
}

/// Annotation span between two anchors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEdge {
    pub id: Uuid,
    pub annotation_type: String,
    pub label: String,
    /// Begin anchor id
    pub begin: u64,
    /// End anchor id
    pub end: u64,
    /// Token-level properties
    pub properties: BTreeMap<String, serde_json::Value>,
    /// `is_a` target
    pub type_key: TypeKey,
    /// Containing span of the supertype tier
    pub parent: Option<Uuid>,
}

/// Everything one discourse contributes to the graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphBatch {
    pub corpus: String,
    pub discourse: String,
    pub anchors: Vec<AnchorNode>,
    pub spans: Vec<SpanEdge>,
    pub types: Vec<TypeNode>,
    /// Token properties indexed on word spans
    pub token_properties: BTreeSet<String>,
    /// Type properties indexed on word type nodes
    pub type_properties: BTreeSet<String>,
    /// Annotation type → supertype annotation type
    pub hierarchy: BTreeMap<String, Option<String>>,
}

impl GraphBatch {
    /// Annotation types present in this batch
    pub fn annotation_types(&self) -> BTreeSet<String> {
        self.hierarchy.keys().cloned().collect()
    }

    /// Span count per annotation type
    pub fn edge_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for span in &self.spans {
            *counts.entry(span.annotation_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Statements to issue before the bulk load, and the load-window
    /// constraints to retract after it
    pub fn schema_statements(&self) -> (Vec<SchemaStatement>, Vec<SchemaStatement>) {
        let mut before = vec![
            SchemaStatement::CreateIndex {
                label: ANCHOR_LABEL.to_string(),
                property: "time".to_string(),
            },
            SchemaStatement::CreateUniqueConstraint {
                label: ANCHOR_LABEL.to_string(),
                property: "id".to_string(),
            },
        ];
        let mut after = vec![SchemaStatement::DropUniqueConstraint {
            label: ANCHOR_LABEL.to_string(),
            property: "id".to_string(),
        }];

        for (at, supertype) in &self.hierarchy {
            before.push(SchemaStatement::CreateUniqueConstraint {
                label: at.clone(),
                property: "id".to_string(),
            });
            if at == WORD_TYPE {
                for p in &self.token_properties {
                    before.push(SchemaStatement::CreateIndex {
                        label: at.clone(),
                        property: p.clone(),
                    });
                }
                for p in &self.type_properties {
                    before.push(SchemaStatement::CreateIndex {
                        label: format!("{}_type", at),
                        property: p.clone(),
                    });
                }
            }
            before.push(SchemaStatement::CreateIndex {
                label: at.clone(),
                property: "label".to_string(),
            });
            before.push(SchemaStatement::CreateIndex {
                label: format!("r_{}", at),
                property: "label".to_string(),
            });
            if let Some(st) = supertype {
                before.push(SchemaStatement::CreateIndex {
                    label: at.clone(),
                    property: st.clone(),
                });
            }
            after.push(SchemaStatement::DropUniqueConstraint {
                label: at.clone(),
                property: "id".to_string(),
            });
        }

        (before, after)
    }
}

/// Schema statement for the graph store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaStatement {
    CreateUniqueConstraint { label: String, property: String },
    DropUniqueConstraint { label: String, property: String },
    CreateIndex { label: String, property: String },
}

/// Scalar graph representation of a property value
pub fn property_to_json(value: &PropertyValue) -> serde_json::Value {
    match value {
        PropertyValue::Numeric(v) => serde_json::Value::from(*v),
        PropertyValue::Text(s) => serde_json::Value::String(s.clone()),
        PropertyValue::Segments(_) => serde_json::Value::String(value.render()),
        PropertyValue::Interval { begin, end } => serde_json::json!([begin, end]),
    }
}
