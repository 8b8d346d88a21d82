//! ttmd-ms library interface
//!
//! Exposes the application state, router and sync engine for
//! integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod sync;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use ttmd_common::config::MirrorConfig;

use crate::services::github_client::GithubClient;
use crate::services::ncm_client::NcmClient;
use crate::sync::SyncState;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Statistics database pool
    pub db: SqlitePool,
    /// Resolved runtime configuration
    pub config: Arc<MirrorConfig>,
    /// Read-only view of the sync engine
    pub sync: SyncState,
    /// NCM song-detail client
    pub ncm: Arc<NcmClient>,
    /// GitHub user client
    pub github: Arc<GithubClient>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Arc<MirrorConfig>,
        sync: SyncState,
        ncm: Arc<NcmClient>,
        github: Arc<GithubClient>,
    ) -> Self {
        Self {
            db,
            config,
            sync,
            ncm,
            github,
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/api/status", get(api::api_status))
        .route("/api/db", get(api::serve_mirror_root))
        .route("/api/db/", get(api::serve_mirror_root))
        .route("/api/db/*path", get(api::serve_mirror_path))
        .route("/api/ncm", get(api::ncm_ranking))
        .route("/api/ncm/no-lyrics", get(api::ncm_no_lyrics))
        .route("/api/ncm/dashboard", get(api::ncm_dashboard))
        .route("/api/contributors", get(api::contributors))
        .route("/api/table/:name", get(api::get_table_data))
        .route("/api/log", get(api::api_log))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
