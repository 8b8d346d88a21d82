//! Access, 404 and no-lyrics bookkeeping plus dashboard aggregates

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use ttmd_common::Result;

use super::now_stamp;

/// Record one served lyric hit
pub async fn record_access(db: &SqlitePool, song_id: &str) -> Result<()> {
    sqlx::query("INSERT INTO ncm_access_log (song_id, accessed_at) VALUES (?, ?)")
        .bind(song_id)
        .bind(now_stamp())
        .execute(db)
        .await?;
    info!(song_id, "recorded lyric access");
    Ok(())
}

/// Record (or bump) a 404 path
pub async fn record_not_found(db: &SqlitePool, path: &str) -> Result<()> {
    let now = now_stamp();
    sqlx::query(
        r#"
        INSERT INTO not_found (path, count, last_seen) VALUES (?, 1, ?)
        ON CONFLICT(path) DO UPDATE SET
            count = count + 1, last_seen = excluded.last_seen
        "#,
    )
    .bind(path)
    .bind(&now)
    .execute(db)
    .await?;
    warn!(path, "recorded missing path");
    Ok(())
}

/// Record a request for a song that exists upstream but has no lyric
/// file yet; repeated requests bump the attempt count.
pub async fn add_no_lyrics_entry(db: &SqlitePool, song_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ncm_no_lyrics (song_id, first_seen, attempt_count)
        VALUES (?, ?, 1)
        ON CONFLICT(song_id) DO UPDATE SET
            attempt_count = attempt_count + 1
        "#,
    )
    .bind(song_id)
    .bind(now_stamp())
    .execute(db)
    .await?;
    info!(song_id, "recorded no-lyrics attempt");
    Ok(())
}

/// Drop a song from the no-lyrics list once its lyric is served
pub async fn remove_no_lyrics_entry(db: &SqlitePool, song_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM ncm_no_lyrics WHERE song_id = ?")
        .bind(song_id)
        .execute(db)
        .await?;
    if result.rows_affected() > 0 {
        info!(song_id, "lyric now available, removed from no-lyrics list");
    }
    Ok(())
}

/// (distinct songs served, 404 paths, no-lyrics songs)
pub async fn summary_counts(db: &SqlitePool) -> Result<(i64, i64, i64)> {
    let ncm_count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT song_id) FROM ncm_access_log")
        .fetch_one(db)
        .await?;
    let not_found_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM not_found")
        .fetch_one(db)
        .await?;
    let no_lyrics_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ncm_no_lyrics")
        .fetch_one(db)
        .await?;
    Ok((ncm_count, not_found_count, no_lyrics_count))
}

/// One row of the per-song access ranking
#[derive(Debug, Serialize)]
pub struct AccessStat {
    pub song_id: String,
    pub access_count: i64,
    pub last_accessed: Option<String>,
}

/// Per-song access counts, most requested first (top 1000)
pub async fn access_ranking(db: &SqlitePool) -> Result<Vec<AccessStat>> {
    let rows = sqlx::query_as::<_, (String, i64, Option<String>)>(
        r#"
        SELECT
            song_id,
            COUNT(song_id) AS access_count,
            MAX(accessed_at) AS last_accessed
        FROM ncm_access_log
        GROUP BY song_id
        ORDER BY access_count DESC, last_accessed DESC
        LIMIT 1000
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(song_id, access_count, last_accessed)| AccessStat {
            song_id,
            access_count,
            last_accessed,
        })
        .collect())
}

/// One row of the no-lyrics listing, joined with cached metadata
#[derive(Debug, Serialize)]
pub struct NoLyricsStat {
    pub song_id: String,
    pub attempt_count: i64,
    pub first_seen: Option<String>,
    pub song_name: Option<String>,
    pub artists: Option<String>,
    pub album: Option<String>,
}

/// No-lyrics songs ordered by how often they were requested
pub async fn no_lyrics_ranking(db: &SqlitePool) -> Result<Vec<NoLyricsStat>> {
    let rows = sqlx::query_as::<
        _,
        (
            String,
            i64,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        ),
    >(
        r#"
        SELECT
            nl.song_id,
            nl.attempt_count,
            nl.first_seen,
            si.song_name,
            si.artists,
            si.album
        FROM ncm_no_lyrics nl
        LEFT JOIN ncm_song_info si ON nl.song_id = si.song_id
        ORDER BY nl.attempt_count DESC
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(song_id, attempt_count, first_seen, song_name, artists, album)| NoLyricsStat {
                song_id,
                attempt_count,
                first_seen,
                song_name,
                artists,
                album,
            },
        )
        .collect())
}

/// Reporting window for dashboard aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsPeriod {
    Today,
    Monthly,
    Yearly,
    Total,
}

impl StatsPeriod {
    /// Parse the `period` query parameter; unknown values mean today
    pub fn parse(raw: &str) -> Self {
        match raw {
            "monthly" => StatsPeriod::Monthly,
            "yearly" => StatsPeriod::Yearly,
            "total" => StatsPeriod::Total,
            _ => StatsPeriod::Today,
        }
    }

    fn access_filter(self) -> &'static str {
        match self {
            StatsPeriod::Today => "WHERE date(accessed_at) = date('now')",
            StatsPeriod::Monthly => {
                "WHERE strftime('%Y-%m', accessed_at) = strftime('%Y-%m', 'now')"
            }
            StatsPeriod::Yearly => "WHERE strftime('%Y', accessed_at) = strftime('%Y', 'now')",
            StatsPeriod::Total => "",
        }
    }

    fn no_lyrics_filter(self) -> &'static str {
        match self {
            StatsPeriod::Today => "WHERE date(first_seen) = date('now')",
            StatsPeriod::Monthly => {
                "WHERE strftime('%Y-%m', first_seen) = strftime('%Y-%m', 'now')"
            }
            StatsPeriod::Yearly => "WHERE strftime('%Y', first_seen) = strftime('%Y', 'now')",
            StatsPeriod::Total => "",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardCounts {
    pub acquired: i64,
    pub no_lyrics: i64,
}

#[derive(Debug, Serialize)]
pub struct HotSong {
    pub song_name: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct HotArtist {
    pub artists: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub stats: DashboardCounts,
    pub hot_songs: Vec<HotSong>,
    pub hot_artists: Vec<HotArtist>,
}

/// Dashboard aggregates for the given period
pub async fn dashboard(db: &SqlitePool, period: StatsPeriod) -> Result<DashboardStats> {
    let acquired: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(DISTINCT song_id) FROM ncm_access_log {}",
        period.access_filter()
    ))
    .fetch_one(db)
    .await?;

    let no_lyrics: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM ncm_no_lyrics {}",
        period.no_lyrics_filter()
    ))
    .fetch_one(db)
    .await?;

    let hot_songs = sqlx::query_as::<_, (String, i64)>(&format!(
        r#"
        SELECT s.song_name, COUNT(l.song_id) as count
        FROM ncm_access_log l
        JOIN ncm_song_info s ON l.song_id = s.song_id
        {}
        GROUP BY l.song_id, s.song_name
        ORDER BY count DESC
        LIMIT 10
        "#,
        period.access_filter()
    ))
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|(song_name, count)| HotSong { song_name, count })
    .collect();

    let hot_artists = sqlx::query_as::<_, (String, i64)>(&format!(
        r#"
        SELECT s.artists, COUNT(l.song_id) as count
        FROM ncm_access_log l
        JOIN ncm_song_info s ON l.song_id = s.song_id
        {}
        GROUP BY s.artists
        ORDER BY count DESC
        LIMIT 10
        "#,
        period.access_filter()
    ))
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|(artists, count)| HotArtist { artists, count })
    .collect();

    Ok(DashboardStats {
        stats: DashboardCounts {
            acquired,
            no_lyrics,
        },
        hot_songs,
        hot_artists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ttmd_common::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[test]
    fn unknown_period_defaults_to_today() {
        assert_eq!(StatsPeriod::parse("bogus"), StatsPeriod::Today);
        assert_eq!(StatsPeriod::parse("monthly"), StatsPeriod::Monthly);
        assert_eq!(StatsPeriod::parse("yearly"), StatsPeriod::Yearly);
        assert_eq!(StatsPeriod::parse("total"), StatsPeriod::Total);
    }

    #[tokio::test]
    async fn access_ranking_groups_and_orders() {
        let db = pool().await;
        for _ in 0..3 {
            record_access(&db, "111").await.unwrap();
        }
        record_access(&db, "222").await.unwrap();

        let ranking = access_ranking(&db).await.unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].song_id, "111");
        assert_eq!(ranking[0].access_count, 3);
        assert_eq!(ranking[1].song_id, "222");
    }

    #[tokio::test]
    async fn not_found_upsert_increments() {
        let db = pool().await;
        record_not_found(&db, "some/path").await.unwrap();
        record_not_found(&db, "some/path").await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT count FROM not_found WHERE path = 'some/path'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn no_lyrics_entries_come_and_go() {
        let db = pool().await;
        add_no_lyrics_entry(&db, "333").await.unwrap();
        add_no_lyrics_entry(&db, "333").await.unwrap();

        let listing = no_lyrics_ranking(&db).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].attempt_count, 2);
        assert!(listing[0].song_name.is_none());

        remove_no_lyrics_entry(&db, "333").await.unwrap();
        assert!(no_lyrics_ranking(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_counts_cover_all_tables() {
        let db = pool().await;
        record_access(&db, "1").await.unwrap();
        record_access(&db, "1").await.unwrap();
        record_access(&db, "2").await.unwrap();
        record_not_found(&db, "x").await.unwrap();
        add_no_lyrics_entry(&db, "3").await.unwrap();

        let (songs, missing, no_lyrics) = summary_counts(&db).await.unwrap();
        assert_eq!(songs, 2);
        assert_eq!(missing, 1);
        assert_eq!(no_lyrics, 1);
    }

    #[tokio::test]
    async fn dashboard_total_includes_everything() {
        let db = pool().await;
        record_access(&db, "1").await.unwrap();
        crate::db::songs::upsert_one(&db, "1", "Song", "Artist", "Album")
            .await
            .unwrap();

        let stats = dashboard(&db, StatsPeriod::Total).await.unwrap();
        assert_eq!(stats.stats.acquired, 1);
        assert_eq!(stats.hot_songs.len(), 1);
        assert_eq!(stats.hot_songs[0].song_name, "Song");
        assert_eq!(stats.hot_artists[0].artists, "Artist");
    }
}
