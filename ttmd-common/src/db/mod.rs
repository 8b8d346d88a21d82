//! Database pool and schema initialization
//!
//! The statistics database is a cache of usage data, never a source of
//! truth for the mirror itself; it is created on demand next to the
//! working copy.

use std::path::Path;

use sqlx::SqlitePool;

use crate::Result;

/// Open (or create) the statistics database and initialize its schema
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the statistics tables if they do not exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // One row per served lyric hit; per-song counts are derived
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ncm_access_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            song_id TEXT NOT NULL,
            accessed_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Cached song metadata from the NCM API
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ncm_song_info (
            song_id TEXT PRIMARY KEY,
            song_name TEXT,
            artists TEXT,
            album TEXT,
            last_updated TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Songs that exist upstream but have no lyric file in the mirror
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ncm_no_lyrics (
            song_id TEXT PRIMARY KEY,
            first_seen TIMESTAMP,
            attempt_count INTEGER DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 404 bookkeeping with upsert increment
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS not_found (
            path TEXT PRIMARY KEY,
            count INTEGER DEFAULT 0,
            last_seen TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One-day cache of GitHub user lookups
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contributors (
            github_id TEXT PRIMARY KEY,
            login TEXT,
            name TEXT,
            avatar_url TEXT,
            last_updated TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}
