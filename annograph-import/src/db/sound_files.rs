//! Sound files attached to discourses

use anyhow::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

pub async fn get_or_create_sound_file(conn: &mut SqliteConnection, discourse_id: i64, path: &str) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM sound_files WHERE discourse_id = ? AND path = ?")
        .bind(discourse_id)
        .bind(path)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO sound_files (discourse_id, path) VALUES (?, ?)")
        .bind(discourse_id)
        .bind(path)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// First sound file of a discourse
pub async fn discourse_sound_file(pool: &SqlitePool, discourse: &str) -> Result<Option<String>> {
    let path = sqlx::query_scalar(
        r#"
        SELECT s.path
        FROM sound_files s
        JOIN discourses d ON d.id = s.discourse_id
        WHERE d.name = ?
        ORDER BY s.id
        LIMIT 1
        "#,
    )
    .bind(discourse)
    .fetch_optional(pool)
    .await?;
    Ok(path)
}

pub async fn has_sound_files(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sound_files")
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// (discourse name, path) for every sound file
pub async fn list_sound_files(pool: &SqlitePool) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(
        r#"
        SELECT d.name AS discourse, s.path AS path
        FROM sound_files s
        JOIN discourses d ON d.id = s.discourse_id
        ORDER BY d.id, s.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("discourse"), row.get("path")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{discourses, init_memory_pool};

    #[tokio::test]
    async fn test_sound_files_follow_their_discourse() {
        let pool = init_memory_pool().await.expect("Failed to create in-memory database");
        assert!(!has_sound_files(&pool).await.unwrap());

        let mut conn = pool.acquire().await.unwrap();
        let d1 = discourses::get_or_create_discourse(&mut conn, "d1").await.unwrap();
        discourses::get_or_create_discourse(&mut conn, "d2").await.unwrap();
        get_or_create_sound_file(&mut conn, d1, "/audio/d1.wav").await.unwrap();
        get_or_create_sound_file(&mut conn, d1, "/audio/d1.wav").await.unwrap();
        drop(conn);

        assert!(has_sound_files(&pool).await.unwrap());
        assert_eq!(
            list_sound_files(&pool).await.unwrap(),
            vec![("d1".to_string(), "/audio/d1.wav".to_string())]
        );
        assert_eq!(discourse_sound_file(&pool, "d2").await.unwrap(), None);

        discourses::delete_discourse(&pool, "d1").await.unwrap();
        assert!(!has_sound_files(&pool).await.unwrap());
    }
}
