//! Discourse rows

use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};

/// Id of the discourse named `name`, inserting it when absent
pub async fn get_or_create_discourse(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM discourses WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO discourses (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// Discourse names in import order
pub async fn list_discourses(pool: &SqlitePool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar("SELECT name FROM discourses ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(names)
}

/// Delete a discourse and, through the cascade, its sound files.
/// Returns whether a row was deleted.
pub async fn delete_discourse(pool: &SqlitePool, name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM discourses WHERE name = ?")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
