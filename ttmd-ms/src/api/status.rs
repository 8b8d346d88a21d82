//! Aggregate status endpoint

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use walkdir::WalkDir;

use crate::db;
use crate::error::ApiResult;
use crate::AppState;

/// Everything the landing page needs in one request
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub last_update_time: String,
    pub last_update_status: String,
    pub dir_size_mb: String,
    pub ncm_count: i64,
    pub not_found_count: i64,
    pub no_lyrics_count: i64,
    /// (endpoint, credit) pairs, highest credit first
    pub proxy_status: Vec<(String, u32)>,
}

/// GET /api/status
pub async fn api_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let (ncm_count, not_found_count, no_lyrics_count) =
        db::stats::summary_counts(&state.db).await?;

    let snapshot = state.sync.snapshot().await;

    let mut proxy_status: Vec<(String, u32)> =
        state.sync.proxy_credits().await.into_iter().collect();
    proxy_status.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mirror_dir: PathBuf = state.config.mirror_dir();
    let dir_size_mb = tokio::task::spawn_blocking(move || dir_size_mb(&mirror_dir))
        .await
        .map_err(|e| crate::error::ApiError::Internal(e.to_string()))?;

    Ok(Json(StatusResponse {
        last_update_time: snapshot.last_update_time,
        last_update_status: snapshot.last_update_status,
        dir_size_mb,
        ncm_count,
        not_found_count,
        no_lyrics_count,
        proxy_status,
    }))
}

/// Working-copy size, formatted in megabytes.
///
/// Symlinks are not followed and an absent directory reads as zero.
fn dir_size_mb(dir: &Path) -> String {
    let mut total: u64 = 0;
    for entry in WalkDir::new(dir).into_iter().flatten() {
        if entry.file_type().is_file() {
            if let Ok(metadata) = entry.metadata() {
                total += metadata.len();
            }
        }
    }
    format!("{:.2} MB", total as f64 / (1024.0 * 1024.0))
}
