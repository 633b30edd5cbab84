//! Segment inventory: annotation types and their distinct labels

use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};

pub async fn get_or_create_annotation_type(conn: &mut SqliteConnection, label: &str) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM annotation_types WHERE label = ?")
        .bind(label)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO annotation_types (label) VALUES (?)")
        .bind(label)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

pub async fn get_or_create_inventory_item(
    conn: &mut SqliteConnection,
    label: &str,
    annotation_type_id: i64,
) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM inventory_items WHERE label = ? AND annotation_type_id = ?",
    )
    .bind(label)
    .bind(annotation_type_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO inventory_items (label, annotation_type_id) VALUES (?, ?)")
        .bind(label)
        .bind(annotation_type_id)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// Sorted labels recorded for an annotation type
pub async fn inventory_labels(pool: &SqlitePool, annotation_type: &str) -> Result<Vec<String>> {
    let labels = sqlx::query_scalar(
        r#"
        SELECT i.label
        FROM inventory_items i
        JOIN annotation_types t ON t.id = i.annotation_type_id
        WHERE t.label = ?
        ORDER BY i.label
        "#,
    )
    .bind(annotation_type)
    .fetch_all(pool)
    .await?;
    Ok(labels)
}
