//! Lexicon rows: words, their frequencies and type properties

use anyhow::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Word record
#[derive(Debug, Clone, PartialEq)]
pub struct WordRecord {
    pub id: i64,
    pub orthography: String,
    pub transcription: String,
    pub frequency: i64,
}

pub async fn get_or_create_word(conn: &mut SqliteConnection, orthography: &str, transcription: &str) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM words WHERE orthography = ? AND transcription = ?")
        .bind(orthography)
        .bind(transcription)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO words (orthography, transcription, frequency) VALUES (?, ?, 0)")
        .bind(orthography)
        .bind(transcription)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

pub async fn add_frequency(conn: &mut SqliteConnection, word_id: i64, delta: u64) -> Result<()> {
    sqlx::query("UPDATE words SET frequency = frequency + ? WHERE id = ?")
        .bind(i64::try_from(delta)?)
        .bind(word_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get_or_create_property_type(conn: &mut SqliteConnection, label: &str) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM word_property_types WHERE label = ?")
        .bind(label)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO word_property_types (label) VALUES (?)")
        .bind(label)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// Text-valued property; segment sequences arrive already joined with `.`
pub async fn get_or_create_property(
    conn: &mut SqliteConnection,
    word_id: i64,
    property_type_id: i64,
    value: &str,
) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM word_properties WHERE word_id = ? AND property_type_id = ? AND value = ?",
    )
    .bind(word_id)
    .bind(property_type_id)
    .bind(value)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO word_properties (word_id, property_type_id, value) VALUES (?, ?, ?)")
        .bind(word_id)
        .bind(property_type_id)
        .bind(value)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

pub async fn get_or_create_numeric_property(
    conn: &mut SqliteConnection,
    word_id: i64,
    property_type_id: i64,
    value: f64,
) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM word_numeric_properties WHERE word_id = ? AND property_type_id = ? AND value = ?",
    )
    .bind(word_id)
    .bind(property_type_id)
    .bind(value)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO word_numeric_properties (word_id, property_type_id, value) VALUES (?, ?, ?)")
        .bind(word_id)
        .bind(property_type_id)
        .bind(value)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// Load word by its natural key
pub async fn load_word(pool: &SqlitePool, orthography: &str, transcription: &str) -> Result<Option<WordRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, orthography, transcription, frequency
        FROM words
        WHERE orthography = ? AND transcription = ?
        "#,
    )
    .bind(orthography)
    .bind(transcription)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| WordRecord {
        id: row.get("id"),
        orthography: row.get("orthography"),
        transcription: row.get("transcription"),
        frequency: row.get("frequency"),
    }))
}

pub async fn word_count(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM words")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// (property label, rendered value) pairs of a word, text and numeric alike
pub async fn word_properties(pool: &SqlitePool, word_id: i64) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(
        r#"
        SELECT t.label AS label, p.value AS value
        FROM word_properties p
        JOIN word_property_types t ON t.id = p.property_type_id
        WHERE p.word_id = ?
        UNION ALL
        SELECT t.label AS label, CAST(n.value AS TEXT) AS value
        FROM word_numeric_properties n
        JOIN word_property_types t ON t.id = n.property_type_id
        WHERE n.word_id = ?
        ORDER BY label
        "#,
    )
    .bind(word_id)
    .bind(word_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("label"), row.get("value")))
        .collect())
}
