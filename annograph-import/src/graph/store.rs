//! Graph store boundary and the two stores shipped with the importer

use super::cypher::{remove_discourse_statement, reset_corpus_statement};
use super::{AnchorNode, GraphBatch, GraphError, SchemaStatement, SpanEdge, TypeKey, TypeNode, ANCHOR_LABEL};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Write side of a property-graph database.
///
/// Calls are synchronous; the corpus context serializes them behind a lock.
pub trait GraphStore: Send {
    fn execute(&mut self, statement: &SchemaStatement) -> Result<(), GraphError>;

    /// Bulk-load one discourse. Fails without partial effect when the
    /// discourse is already present.
    fn load_discourse(&mut self, batch: &GraphBatch) -> Result<(), GraphError>;

    /// Delete the discourse's anchors and spans. Type nodes are kept.
    fn remove_discourse(&mut self, corpus: &str, discourse: &str) -> Result<(), GraphError>;

    /// Delete everything belonging to the corpus
    fn reset_corpus(&mut self, corpus: &str) -> Result<(), GraphError>;
}

/// Anchors and spans of one loaded discourse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscourseGraph {
    pub anchors: Vec<AnchorNode>,
    pub spans: Vec<SpanEdge>,
}

impl DiscourseGraph {
    pub fn spans_of_type<'a>(&'a self, annotation_type: &'a str) -> impl Iterator<Item = &'a SpanEdge> + 'a {
        self.spans.iter().filter(move |s| s.annotation_type == annotation_type)
    }

    pub fn anchor(&self, id: u64) -> Option<&AnchorNode> {
        self.anchors.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, Default)]
struct CorpusGraph {
    discourses: BTreeMap<String, DiscourseGraph>,
    types: BTreeMap<TypeKey, TypeNode>,
}

/// In-process graph store. Enforces uniqueness constraints the way a graph
/// database would while they are active.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    constraints: BTreeSet<(String, String)>,
    indexes: BTreeSet<(String, String)>,
    corpora: BTreeMap<String, CorpusGraph>,
    executed: Vec<SchemaStatement>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discourse(&self, corpus: &str, discourse: &str) -> Option<&DiscourseGraph> {
        self.corpora.get(corpus)?.discourses.get(discourse)
    }

    pub fn discourse_names(&self, corpus: &str) -> Vec<String> {
        self.corpora
            .get(corpus)
            .map(|c| c.discourses.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn type_nodes(&self, corpus: &str) -> Vec<&TypeNode> {
        self.corpora
            .get(corpus)
            .map(|c| c.types.values().collect())
            .unwrap_or_default()
    }

    /// Constraints currently in force, as (label, property)
    pub fn active_constraints(&self) -> &BTreeSet<(String, String)> {
        &self.constraints
    }

    pub fn indexes(&self) -> &BTreeSet<(String, String)> {
        &self.indexes
    }

    /// Every schema statement executed so far, in order
    pub fn executed(&self) -> &[SchemaStatement] {
        &self.executed
    }

    fn check_constraints(&self, batch: &GraphBatch) -> Result<(), GraphError> {
        if self.constraints.contains(&(ANCHOR_LABEL.to_string(), "id".to_string())) {
            let mut seen = BTreeSet::new();
            for anchor in &batch.anchors {
                if !seen.insert(anchor.id) {
                    return Err(GraphError::ConstraintViolation {
                        label: ANCHOR_LABEL.to_string(),
                        property: "id".to_string(),
                        value: anchor.id.to_string(),
                    });
                }
            }
        }

        let existing: Vec<&SpanEdge> = self
            .corpora
            .get(&batch.corpus)
            .map(|c| c.discourses.values().flat_map(|d| d.spans.iter()).collect())
            .unwrap_or_default();
        let mut seen = BTreeSet::new();
        for span in existing.into_iter().chain(batch.spans.iter()) {
            let key = (span.annotation_type.clone(), "id".to_string());
            if !self.constraints.contains(&key) {
                continue;
            }
            if !seen.insert((span.annotation_type.as_str(), span.id)) {
                return Err(GraphError::ConstraintViolation {
                    label: span.annotation_type.clone(),
                    property: "id".to_string(),
                    value: span.id.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl GraphStore for MemoryGraphStore {
    fn execute(&mut self, statement: &SchemaStatement) -> Result<(), GraphError> {
        match statement {
            SchemaStatement::CreateUniqueConstraint { label, property } => {
                self.constraints.insert((label.clone(), property.clone()));
            }
            SchemaStatement::DropUniqueConstraint { label, property } => {
                self.constraints.remove(&(label.clone(), property.clone()));
            }
            SchemaStatement::CreateIndex { label, property } => {
                self.indexes.insert((label.clone(), property.clone()));
            }
        }
        self.executed.push(statement.clone());
        Ok(())
    }

    fn load_discourse(&mut self, batch: &GraphBatch) -> Result<(), GraphError> {
        if self.discourse(&batch.corpus, &batch.discourse).is_some() {
            return Err(GraphError::DiscourseExists {
                corpus: batch.corpus.clone(),
                discourse: batch.discourse.clone(),
            });
        }
        let anchor_ids: BTreeSet<u64> = batch.anchors.iter().map(|a| a.id).collect();
        for span in &batch.spans {
            for anchor in [span.begin, span.end] {
                if !anchor_ids.contains(&anchor) {
                    return Err(GraphError::MissingAnchor { span: span.id, anchor });
                }
            }
        }
        self.check_constraints(batch)?;

        let corpus = self.corpora.entry(batch.corpus.clone()).or_default();
        for node in &batch.types {
            corpus.types.entry(node.key.clone()).or_insert_with(|| node.clone());
        }
        corpus.discourses.insert(
            batch.discourse.clone(),
            DiscourseGraph {
                anchors: batch.anchors.clone(),
                spans: batch.spans.clone(),
            },
        );
        debug!(
            "Loaded discourse '{}' into corpus '{}': {} anchors, {} spans",
            batch.discourse,
            batch.corpus,
            batch.anchors.len(),
            batch.spans.len()
        );
        Ok(())
    }

    fn remove_discourse(&mut self, corpus: &str, discourse: &str) -> Result<(), GraphError> {
        if let Some(c) = self.corpora.get_mut(corpus) {
            c.discourses.remove(discourse);
        }
        Ok(())
    }

    fn reset_corpus(&mut self, corpus: &str) -> Result<(), GraphError> {
        self.corpora.remove(corpus);
        Ok(())
    }
}

/// Appends Cypher statements to `<dir>/<corpus>.cypher` for loading into a
/// graph database later.
#[derive(Debug, Clone)]
pub struct CypherScriptStore {
    dir: PathBuf,
    corpus: String,
    loaded: BTreeSet<String>,
}

impl CypherScriptStore {
    pub fn new(dir: impl Into<PathBuf>, corpus: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            corpus: corpus.into(),
            loaded: BTreeSet::new(),
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.join(format!("{}.cypher", self.corpus))
    }

    fn append(&self, text: &str) -> Result<(), GraphError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.script_path())?;
        file.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl GraphStore for CypherScriptStore {
    fn execute(&mut self, statement: &SchemaStatement) -> Result<(), GraphError> {
        self.append(&statement.to_cypher())
    }

    fn load_discourse(&mut self, batch: &GraphBatch) -> Result<(), GraphError> {
        if self.loaded.contains(&batch.discourse) {
            return Err(GraphError::DiscourseExists {
                corpus: batch.corpus.clone(),
                discourse: batch.discourse.clone(),
            });
        }
        self.append(&batch.to_cypher())?;
        self.loaded.insert(batch.discourse.clone());
        info!(
            "Wrote discourse '{}' to {}",
            batch.discourse,
            self.script_path().display()
        );
        Ok(())
    }

    fn remove_discourse(&mut self, corpus: &str, discourse: &str) -> Result<(), GraphError> {
        self.append(&remove_discourse_statement(corpus, discourse))?;
        self.loaded.remove(discourse);
        Ok(())
    }

    fn reset_corpus(&mut self, corpus: &str) -> Result<(), GraphError> {
        self.append(&reset_corpus_statement(corpus))?;
        self.loaded.clear();
        Ok(())
    }
}
