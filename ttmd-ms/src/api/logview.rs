//! Service log tail endpoint

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

/// Number of trailing log lines served
const TAIL_LINES: usize = 1000;

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub log_content: String,
}

/// GET /api/log
pub async fn api_log(State(state): State<AppState>) -> ApiResult<Json<LogResponse>> {
    let path = state.config.log_path();
    let log_content = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => tail(&raw, TAIL_LINES),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "log file not found".to_string(),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(LogResponse { log_content }))
}

fn tail(raw: &str, lines: usize) -> String {
    let all: Vec<&str> = raw.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
