//! Post-import acoustic analysis hook
//!
//! Analysis itself lives outside this crate. The importer only finds the
//! discourse's audio and hands it to whatever analyzer the corpus was opened
//! with.

use std::path::Path;
use tracing::{debug, warn};

pub trait AcousticAnalyzer: Send + Sync {
    fn analyze_discourse(&self, discourse: &str, wav_path: &Path) -> anyhow::Result<()>;
}

/// Run the analyzer on a freshly imported discourse.
///
/// Returns whether analysis ran. A missing audio path is a no-op; an analyzer
/// failure is logged, since both stores already hold the discourse.
pub fn run_post_import(analyzer: Option<&dyn AcousticAnalyzer>, discourse: &str, wav_path: Option<&Path>) -> bool {
    let Some(analyzer) = analyzer else {
        return false;
    };
    let Some(path) = wav_path else {
        debug!("No sound file for discourse '{}', skipping acoustic analysis", discourse);
        return false;
    };
    if !path.exists() {
        debug!(
            "Sound file {} for discourse '{}' does not exist, skipping acoustic analysis",
            path.display(),
            discourse
        );
        return false;
    }

    match analyzer.analyze_discourse(discourse, path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Acoustic analysis of discourse '{}' failed: {:#}", discourse, e);
            false
        }
    }
}
