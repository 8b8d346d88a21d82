//! Cached NCM song metadata

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::info;
use ttmd_common::Result;

use super::now_stamp;
use crate::services::ncm_client::SongDetails;

/// Known metadata for the given song ids
pub async fn get_song_info(
    db: &SqlitePool,
    song_ids: &[String],
) -> Result<HashMap<String, SongDetails>> {
    if song_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; song_ids.len()].join(",");
    let sql = format!(
        "SELECT song_id, song_name, artists, album FROM ncm_song_info WHERE song_id IN ({placeholders})"
    );

    let mut query =
        sqlx::query_as::<_, (String, Option<String>, Option<String>, Option<String>)>(&sql);
    for song_id in song_ids {
        query = query.bind(song_id);
    }

    let rows = query.fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(song_id, song_name, artists, album)| {
            (
                song_id,
                SongDetails {
                    song_name: song_name.unwrap_or_else(|| "N/A".to_string()),
                    artists: artists.unwrap_or_default(),
                    album: album.unwrap_or_else(|| "N/A".to_string()),
                },
            )
        })
        .collect())
}

/// Insert or refresh one song's metadata
pub async fn upsert_one(
    db: &SqlitePool,
    song_id: &str,
    song_name: &str,
    artists: &str,
    album: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ncm_song_info (song_id, song_name, artists, album, last_updated)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(song_id) DO UPDATE SET
            song_name = excluded.song_name,
            artists = excluded.artists,
            album = excluded.album,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(song_id)
    .bind(song_name)
    .bind(artists)
    .bind(album)
    .bind(now_stamp())
    .execute(db)
    .await?;
    Ok(())
}

/// Batch insert or refresh song metadata
pub async fn upsert_song_info(
    db: &SqlitePool,
    details: &HashMap<String, SongDetails>,
) -> Result<()> {
    if details.is_empty() {
        return Ok(());
    }
    for (song_id, info) in details {
        upsert_one(db, song_id, &info.song_name, &info.artists, &info.album).await?;
    }
    info!(count = details.len(), "updated song metadata cache");
    Ok(())
}
