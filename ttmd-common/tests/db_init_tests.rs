//! Schema initialization tests

#[tokio::test]
async fn init_tables_is_idempotent() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ttmd_common::db::init_tables(&pool).await.unwrap();
    // A second run must not fail on existing tables
    ttmd_common::db::init_tables(&pool).await.unwrap();
}

#[tokio::test]
async fn tables_accept_rows() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ttmd_common::db::init_tables(&pool).await.unwrap();

    sqlx::query("INSERT INTO ncm_access_log (song_id, accessed_at) VALUES (?, ?)")
        .bind("12345")
        .bind("2026-01-01 00:00:00")
        .execute(&pool)
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT song_id) FROM ncm_access_log")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn init_database_pool_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stats.db");

    let pool = ttmd_common::db::init_database_pool(&db_path).await.unwrap();
    sqlx::query("INSERT INTO not_found (path, count, last_seen) VALUES ('x', 1, '2026-01-01')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    assert!(db_path.exists());
}
