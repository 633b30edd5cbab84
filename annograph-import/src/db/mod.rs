//! Relational side-index
//!
//! SQLite tables for discourses, the segment inventory, the lexicon and sound
//! files. Every table has a unique natural key and every write is
//! get-or-create, so re-importing a discourse never duplicates a row.

pub mod discourses;
pub mod inventory;
pub mod sound_files;
pub mod words;

use crate::projection::RelationalRows;
use annograph_common::PropertyValue;
use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory pool with the schema applied
///
/// The connection never idles out: closing it would drop the database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the side-index tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS discourses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS annotation_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS inventory_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            annotation_type_id INTEGER NOT NULL REFERENCES annotation_types(id) ON DELETE CASCADE,
            UNIQUE(label, annotation_type_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS words (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            orthography TEXT NOT NULL,
            transcription TEXT NOT NULL DEFAULT '',
            frequency INTEGER NOT NULL DEFAULT 0,
            UNIQUE(orthography, transcription)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS word_property_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS word_properties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
            property_type_id INTEGER NOT NULL REFERENCES word_property_types(id) ON DELETE CASCADE,
            value TEXT NOT NULL,
            UNIQUE(word_id, property_type_id, value)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS word_numeric_properties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
            property_type_id INTEGER NOT NULL REFERENCES word_property_types(id) ON DELETE CASCADE,
            value REAL NOT NULL,
            UNIQUE(word_id, property_type_id, value)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS sound_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            discourse_id INTEGER NOT NULL REFERENCES discourses(id) ON DELETE CASCADE,
            path TEXT NOT NULL,
            UNIQUE(discourse_id, path)
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database tables initialized (discourses, inventory, words, sound_files)");

    Ok(())
}

/// Drop every side-index table and recreate them empty
pub async fn reset_tables(pool: &SqlitePool) -> Result<()> {
    for table in [
        "sound_files",
        "word_numeric_properties",
        "word_properties",
        "word_property_types",
        "words",
        "inventory_items",
        "annotation_types",
        "discourses",
    ] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }
    init_tables(pool).await
}

/// Row counts written for one discourse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationalSummary {
    pub discourse_id: i64,
    pub words: usize,
    pub inventory_items: usize,
    pub properties: usize,
}

/// Write one discourse's rows in a single transaction
pub async fn write_discourse(pool: &SqlitePool, rows: &RelationalRows) -> Result<RelationalSummary> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin relational transaction")?;

    let discourse_id = discourses::get_or_create_discourse(&mut tx, &rows.discourse).await?;
    let mut summary = RelationalSummary {
        discourse_id,
        ..Default::default()
    };

    for (annotation_type, labels) in &rows.inventory {
        let type_id = inventory::get_or_create_annotation_type(&mut tx, annotation_type).await?;
        for label in labels {
            inventory::get_or_create_inventory_item(&mut tx, label, type_id).await?;
            summary.inventory_items += 1;
        }
    }

    for row in &rows.words {
        let word_id = words::get_or_create_word(&mut tx, &row.key.orthography, &row.key.transcription).await?;
        words::add_frequency(&mut tx, word_id, row.frequency).await?;
        summary.words += 1;

        for (name, value) in &row.properties {
            let property_type_id = words::get_or_create_property_type(&mut tx, name).await?;
            match value {
                PropertyValue::Numeric(v) => {
                    words::get_or_create_numeric_property(&mut tx, word_id, property_type_id, *v).await?;
                }
                other => {
                    words::get_or_create_property(&mut tx, word_id, property_type_id, &other.render()).await?;
                }
            }
            summary.properties += 1;
        }
    }

    if let Some(path) = &rows.sound_file {
        sound_files::get_or_create_sound_file(&mut tx, discourse_id, &path.to_string_lossy()).await?;
    }

    tx.commit()
        .await
        .with_context(|| format!("Failed to commit discourse '{}'", rows.discourse))?;

    tracing::debug!(
        "Relational rows written for '{}': {} words, {} inventory items, {} properties",
        rows.discourse,
        summary.words,
        summary.inventory_items,
        summary.properties
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::WordKey;
    use crate::projection::WordRow;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;

    fn rows() -> RelationalRows {
        let mut properties = BTreeMap::new();
        properties.insert("frequency".to_string(), PropertyValue::Numeric(12.0));
        properties.insert("pos".to_string(), PropertyValue::from("N"));
        let mut inventory = BTreeMap::new();
        inventory.insert(
            "phone".to_string(),
            ["k", "æ", "t"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        );
        RelationalRows {
            discourse: "d1".to_string(),
            words: vec![WordRow {
                key: WordKey::new("cat", "k.æ.t"),
                frequency: 2,
                properties,
            }],
            inventory,
            sound_file: Some(PathBuf::from("/audio/d1.wav")),
        }
    }

    #[tokio::test]
    async fn test_write_discourse_is_idempotent_except_frequency() {
        let pool = init_memory_pool().await.expect("Failed to create in-memory database");

        let first = write_discourse(&pool, &rows()).await.unwrap();
        let second = write_discourse(&pool, &rows()).await.unwrap();
        assert_eq!(first.discourse_id, second.discourse_id);

        let word = words::load_word(&pool, "cat", "k.æ.t").await.unwrap().unwrap();
        assert_eq!(word.frequency, 4);
        assert_eq!(words::word_count(&pool).await.unwrap(), 1);
        assert_eq!(words::word_properties(&pool, word.id).await.unwrap().len(), 2);
        assert_eq!(inventory::inventory_labels(&pool, "phone").await.unwrap().len(), 3);
        assert_eq!(
            sound_files::discourse_sound_file(&pool, "d1").await.unwrap(),
            Some("/audio/d1.wav".to_string())
        );
    }

    #[tokio::test]
    async fn test_reset_tables_empties_everything() {
        let pool = init_memory_pool().await.unwrap();
        write_discourse(&pool, &rows()).await.unwrap();

        reset_tables(&pool).await.unwrap();
        assert!(discourses::list_discourses(&pool).await.unwrap().is_empty());
        assert_eq!(words::word_count(&pool).await.unwrap(), 0);
        assert!(!sound_files::has_sound_files(&pool).await.unwrap());
    }
}
