//! Corpus state snapshot persisted between sessions

use crate::error::ImportResult;
use crate::graph::GraphBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusState {
    /// Every annotation type loaded into the graph
    #[serde(default)]
    pub relationship_types: BTreeSet<String>,
    /// Timing of the most recently imported discourse
    #[serde(default)]
    pub is_timed: bool,
    /// Annotation type → supertype, merged across imports
    #[serde(default)]
    pub hierarchy: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl CorpusState {
    /// Load the snapshot, or start empty when none was saved yet
    pub fn load(path: &Path) -> ImportResult<Self> {
        if !path.exists() {
            debug!("No corpus state at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;
        info!(
            "Loaded corpus state from {} ({} annotation types)",
            path.display(),
            state.relationship_types.len()
        );
        Ok(state)
    }

    /// Written to a temporary file, then renamed into place
    pub fn save(&mut self, path: &Path) -> ImportResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.saved_at = Some(Utc::now());
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        debug!("Saved corpus state to {}", path.display());
        Ok(())
    }

    pub fn record_discourse(&mut self, batch: &GraphBatch, is_timed: bool) {
        self.relationship_types.extend(batch.annotation_types());
        self.is_timed = is_timed;
        for (annotation_type, supertype) in &batch.hierarchy {
            let entry = self.hierarchy.entry(annotation_type.clone()).or_insert(None);
            if supertype.is_some() {
                *entry = supertype.clone();
            }
        }
    }

    /// Forget graph-derived state
    pub fn clear(&mut self) {
        self.relationship_types.clear();
        self.hierarchy.clear();
        self.is_timed = false;
    }
}
