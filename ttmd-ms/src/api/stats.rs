//! NCM usage statistics endpoints

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db;
use crate::db::stats::{DashboardStats, NoLyricsStat, StatsPeriod};
use crate::error::ApiResult;
use crate::AppState;

/// One row of the access ranking, decorated with cached metadata
#[derive(Debug, Serialize)]
pub struct RankedSong {
    pub song_id: String,
    pub access_count: i64,
    pub last_accessed: Option<String>,
    pub song_name: String,
    pub artists: String,
    pub album: String,
}

/// GET /api/ncm
///
/// Per-song access ranking. Songs without cached metadata are resolved
/// through the NCM API and cached before responding; if the API cannot
/// answer, placeholders are used rather than failing the request.
pub async fn ncm_ranking(State(state): State<AppState>) -> ApiResult<Json<Vec<RankedSong>>> {
    let ranking = db::stats::access_ranking(&state.db).await?;
    let song_ids: Vec<String> = ranking.iter().map(|row| row.song_id.clone()).collect();

    let mut info_map = db::songs::get_song_info(&state.db, &song_ids).await?;

    let unknown: Vec<String> = song_ids
        .iter()
        .filter(|id| !info_map.contains_key(*id))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        info!(count = unknown.len(), "fetching unknown songs from NCM API");
        let fetched = state.ncm.fetch_song_details(&unknown).await;
        if !fetched.is_empty() {
            db::songs::upsert_song_info(&state.db, &fetched).await?;
            info_map.extend(fetched);
        }
    }

    let rows = ranking
        .into_iter()
        .map(|row| {
            let details = info_map.get(&row.song_id);
            RankedSong {
                song_name: details
                    .map(|d| d.song_name.clone())
                    .unwrap_or_else(|| "(unknown)".to_string()),
                artists: details
                    .map(|d| d.artists.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                album: details
                    .map(|d| d.album.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                song_id: row.song_id,
                access_count: row.access_count,
                last_accessed: row.last_accessed,
            }
        })
        .collect();

    Ok(Json(rows))
}

/// GET /api/ncm/no-lyrics
pub async fn ncm_no_lyrics(State(state): State<AppState>) -> ApiResult<Json<Vec<NoLyricsStat>>> {
    Ok(Json(db::stats::no_lyrics_ranking(&state.db).await?))
}

/// Query parameters for the dashboard
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub period: Option<String>,
}

/// GET /api/ncm/dashboard?period=today|monthly|yearly|total
pub async fn ncm_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardStats>> {
    let period = StatsPeriod::parse(query.period.as_deref().unwrap_or("today"));
    Ok(Json(db::stats::dashboard(&state.db, period).await?))
}
