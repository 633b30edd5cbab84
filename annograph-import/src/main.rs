//! annograph-import - discourse importer
//!
//! Reads discourses serialized as JSON, projects each into the corpus graph
//! and the relational side-index, and writes the graph side as a Cypher script.

use annograph_common::config::{resolve_root_folder, CorpusPaths, TomlConfig, ROOT_ENV_VAR};
use annograph_common::DiscourseData;
use annograph_import::{CorpusContext, CypherScriptStore};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "annograph-import", version, about = "Import annotated discourses into a corpus")]
struct Args {
    /// Storage root (overrides ANNOGRAPH_ROOT and the config file)
    #[arg(long)]
    root: Option<String>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reset the corpus before importing
    #[arg(long)]
    reset: bool,

    /// Directory for the Cypher script (defaults to the corpus data directory)
    #[arg(long)]
    cypher_out: Option<PathBuf>,

    /// Corpus name
    corpus: String,

    /// Discourse JSON files
    discourses: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match &config.logging.file {
        Some(log_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    info!("Starting annograph-import");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root = resolve_root_folder(args.root.as_deref(), ROOT_ENV_VAR, Some(&config));
    info!("Root folder: {}", root.display());
    let paths = CorpusPaths::new(&root, &args.corpus);

    let script_dir = args.cypher_out.clone().unwrap_or_else(|| paths.data_dir.clone());
    let store = CypherScriptStore::new(script_dir, args.corpus.clone());
    let script_path = store.script_path();
    let corpus = CorpusContext::open(paths, store).await?;

    if args.reset {
        corpus.reset().await?;
    }

    let tokenizers = config.tokenizers()?;
    let mut failures = 0usize;
    for path in &args.discourses {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read discourse file {}", path.display()))?;
        let mut data: DiscourseData = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse discourse file {}", path.display()))?;
        config.apply_tier_presets(&mut data)?;
        data.tokenize_text_properties(&tokenizers)?;

        match corpus.add_discourse(data).await {
            Ok(summary) => info!(
                "{}: {} anchors, {} tokens, {} word types",
                summary.discourse, summary.anchors, summary.tokens, summary.word_types
            ),
            Err(e) => {
                error!("Import of {} failed: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    corpus.close().await?;
    info!("Graph script: {}", script_path.display());

    if failures > 0 {
        anyhow::bail!("{} of {} discourses failed to import", failures, args.discourses.len());
    }
    Ok(())
}
