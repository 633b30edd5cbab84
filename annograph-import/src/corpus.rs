//! Corpus context: the handle every import and query goes through
//!
//! Shared state sits behind `Arc` so the context clones cheaply into tasks.
//! Imports are serialized by a dedicated lock; the graph, lexicon and state
//! each have their own.

use crate::acoustics::{run_post_import, AcousticAnalyzer};
use crate::db;
use crate::error::{ImportError, ImportResult};
use crate::graph::GraphStore;
use crate::lexicon::Lexicon;
use crate::projection::project_discourse;
use crate::state::CorpusState;
use annograph_common::config::CorpusPaths;
use annograph_common::tier::log_annotation_types;
use annograph_common::DiscourseData;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Outcome of one successful import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub discourse: String,
    pub anchors: usize,
    /// Span count per annotation type
    pub spans: BTreeMap<String, usize>,
    pub tokens: usize,
    pub word_types: usize,
    pub dropped: BTreeMap<String, usize>,
    pub is_timed: bool,
    pub acoustics_run: bool,
}

pub struct CorpusContext<G: GraphStore> {
    pub corpus_name: String,
    pub paths: CorpusPaths,
    /// Relational side-index
    pub db: SqlitePool,
    graph: Arc<Mutex<G>>,
    state: Arc<RwLock<CorpusState>>,
    lexicon: Arc<Mutex<Lexicon>>,
    import_lock: Arc<Mutex<()>>,
    acoustics: Option<Arc<dyn AcousticAnalyzer>>,
}

impl<G: GraphStore> Clone for CorpusContext<G> {
    fn clone(&self) -> Self {
        Self {
            corpus_name: self.corpus_name.clone(),
            paths: self.paths.clone(),
            db: self.db.clone(),
            graph: Arc::clone(&self.graph),
            state: Arc::clone(&self.state),
            lexicon: Arc::clone(&self.lexicon),
            import_lock: Arc::clone(&self.import_lock),
            acoustics: self.acoustics.clone(),
        }
    }
}

impl<G: GraphStore> CorpusContext<G> {
    /// Open a corpus on disk: directories, database and saved state
    pub async fn open(paths: CorpusPaths, graph: G) -> ImportResult<Self> {
        paths.ensure_directories()?;

        let db_path = paths.database_path();
        info!("Database: {}", db_path.display());
        let db = db::init_database_pool(&db_path).await?;
        info!("Database connection established");

        let state = CorpusState::load(&paths.state_path())?;
        Ok(Self::from_parts(paths, db, graph, state))
    }

    pub fn from_parts(paths: CorpusPaths, db: SqlitePool, graph: G, state: CorpusState) -> Self {
        Self {
            corpus_name: paths.corpus_name.clone(),
            paths,
            db,
            graph: Arc::new(Mutex::new(graph)),
            state: Arc::new(RwLock::new(state)),
            lexicon: Arc::new(Mutex::new(Lexicon::new())),
            import_lock: Arc::new(Mutex::new(())),
            acoustics: None,
        }
    }

    pub fn with_acoustics(mut self, analyzer: Arc<dyn AcousticAnalyzer>) -> Self {
        self.acoustics = Some(analyzer);
        self
    }

    /// Save state, clear the temp directory and close the pool
    pub async fn close(&self) -> ImportResult<()> {
        self.state.write().await.save(&self.paths.state_path())?;
        if self.paths.temp_dir.exists() {
            std::fs::remove_dir_all(&self.paths.temp_dir)?;
        }
        self.db.close().await;
        info!("Closed corpus '{}'", self.corpus_name);
        Ok(())
    }

    /// Import one discourse into both stores.
    ///
    /// Order: project (all fatal validation), graph load bracketed by schema
    /// statements, relational transaction, then state and lexicon updates and
    /// the acoustic hook. A relational failure after the graph load returns
    /// [`ImportError::PartialImport`].
    pub async fn add_discourse(&self, mut data: DiscourseData) -> ImportResult<ImportSummary> {
        let _guard = self.import_lock.lock().await;
        info!("Importing discourse '{}' into corpus '{}'", data.name, self.corpus_name);

        if data.has_speakers() {
            data.collapse_speakers()?;
        }
        log_annotation_types(data.tiers());

        let mut lexicon = self.lexicon.lock().await.clone();
        let projection = project_discourse(&data, &self.corpus_name, &mut lexicon)?;

        {
            let mut graph = self.graph.lock().await;
            let (before, after) = projection.graph.schema_statements();
            let loaded = before
                .iter()
                .try_for_each(|statement| graph.execute(statement))
                .and_then(|()| graph.load_discourse(&projection.graph));
            // load-window constraints are retracted whether or not the load went through
            let retracted = after.iter().try_for_each(|statement| graph.execute(statement));
            loaded?;
            retracted?;
        }
        self.state
            .write()
            .await
            .record_discourse(&projection.graph, projection.is_timed);

        if let Err(source) = db::write_discourse(&self.db, &projection.relational).await {
            warn!(
                "Graph holds discourse '{}' but the relational write failed: {:#}",
                data.name, source
            );
            return Err(ImportError::PartialImport {
                discourse: data.name.clone(),
                source,
            });
        }

        *self.lexicon.lock().await = lexicon;

        let acoustics_run = run_post_import(self.acoustics.as_deref(), &data.name, data.wav_path.as_deref());

        let summary = ImportSummary {
            discourse: data.name.clone(),
            anchors: projection.graph.anchors.len(),
            spans: projection.graph.edge_counts(),
            tokens: projection.tokens.len(),
            word_types: projection.relational.words.len(),
            dropped: projection.dropped,
            is_timed: projection.is_timed,
            acoustics_run,
        };
        info!(
            "Imported discourse '{}': {} anchors, {} tokens",
            summary.discourse, summary.anchors, summary.tokens
        );
        Ok(summary)
    }

    /// Remove a discourse from the graph and the relational discourse table.
    /// Word frequencies it contributed are kept until a full reset.
    pub async fn remove_discourse(&self, name: &str) -> ImportResult<()> {
        let _guard = self.import_lock.lock().await;
        self.graph.lock().await.remove_discourse(&self.corpus_name, name)?;
        db::discourses::delete_discourse(&self.db, name).await?;
        info!("Removed discourse '{}' from corpus '{}'", name, self.corpus_name);
        Ok(())
    }

    /// Drop everything this corpus put in the graph
    pub async fn reset_graph(&self) -> ImportResult<()> {
        let _guard = self.import_lock.lock().await;
        self.graph.lock().await.reset_corpus(&self.corpus_name)?;
        self.state.write().await.clear();
        info!("Reset graph of corpus '{}'", self.corpus_name);
        Ok(())
    }

    /// Graph, relational tables, lexicon and state back to empty
    pub async fn reset(&self) -> ImportResult<()> {
        let _guard = self.import_lock.lock().await;
        self.graph.lock().await.reset_corpus(&self.corpus_name)?;
        db::reset_tables(&self.db).await?;
        self.lexicon.lock().await.clear();
        let mut state = self.state.write().await;
        *state = CorpusState::default();
        state.save(&self.paths.state_path())?;
        info!("Reset corpus '{}'", self.corpus_name);
        Ok(())
    }

    pub async fn discourses(&self) -> ImportResult<Vec<String>> {
        Ok(db::discourses::list_discourses(&self.db).await?)
    }

    pub async fn discourse_sound_file(&self, name: &str) -> ImportResult<Option<PathBuf>> {
        Ok(db::sound_files::discourse_sound_file(&self.db, name)
            .await?
            .map(PathBuf::from))
    }

    pub async fn has_sound_files(&self) -> ImportResult<bool> {
        Ok(db::sound_files::has_sound_files(&self.db).await?)
    }

    /// Supertype of an annotation type the graph holds spans of
    pub async fn annotation_type(&self, name: &str) -> ImportResult<Option<String>> {
        let state = self.state.read().await;
        if state.relationship_types.contains(name) {
            return Ok(state.hierarchy.get(name).cloned().flatten());
        }
        Err(ImportError::UnknownAnnotationType {
            name: name.to_string(),
            available: state
                .relationship_types
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Sound files to measure spans of `annotation_type` against, as
    /// (discourse, path)
    pub async fn query_acoustics(&self, annotation_type: &str) -> ImportResult<Vec<(String, PathBuf)>> {
        self.annotation_type(annotation_type).await?;
        let files = db::sound_files::list_sound_files(&self.db).await?;
        if files.is_empty() {
            return Err(ImportError::NoSoundFiles(self.corpus_name.clone()));
        }
        Ok(files
            .into_iter()
            .map(|(discourse, path)| (discourse, PathBuf::from(path)))
            .collect())
    }

    /// Run the acoustic analyzer over every sound file; returns how many ran
    pub async fn analyze_acoustics(&self) -> ImportResult<usize> {
        let files = db::sound_files::list_sound_files(&self.db).await?;
        if files.is_empty() {
            return Err(ImportError::NoSoundFiles(self.corpus_name.clone()));
        }
        let analyzer = self.acoustics.as_deref();
        Ok(files
            .iter()
            .filter(|(discourse, path)| run_post_import(analyzer, discourse, Some(PathBuf::from(path).as_path())))
            .count())
    }

    pub async fn state(&self) -> CorpusState {
        self.state.read().await.clone()
    }

    pub async fn lexicon(&self) -> Lexicon {
        self.lexicon.lock().await.clone()
    }

    /// Read access to the graph store
    pub async fn with_graph<R>(&self, f: impl FnOnce(&G) -> R) -> R {
        let graph = self.graph.lock().await;
        f(&graph)
    }
}
