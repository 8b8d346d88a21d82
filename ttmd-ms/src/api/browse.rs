//! Working-copy browsing and file serving
//!
//! Directory requests return a JSON listing; file requests return the
//! raw bytes. Lyric hits and misses feed the statistics tables as a
//! side effect of serving.

use std::path::{Component, Path, PathBuf};

use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// JSON directory listing
#[derive(Debug, Serialize)]
pub struct DirListing {
    pub path: String,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// GET /api/db/
pub async fn serve_mirror_root(State(state): State<AppState>) -> ApiResult<Response> {
    serve(state, String::new()).await
}

/// GET /api/db/*path
pub async fn serve_mirror_path(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> ApiResult<Response> {
    serve(state, path).await
}

async fn serve(state: AppState, rel: String) -> ApiResult<Response> {
    let base = state.config.mirror_dir();
    if !base.exists() {
        // Transiently absent during a reclone; callers retry
        return Err(ApiError::ServiceUnavailable(
            "repository not cloned yet, try again shortly".to_string(),
        ));
    }

    let Some(target) = resolve_within(&base, &rel) else {
        return Err(ApiError::Forbidden);
    };

    if !target.exists() {
        db::stats::record_not_found(&state.db, &rel).await?;

        // A miss on a lyric path may mean the song exists upstream but
        // has no lyric file yet; that distinction feeds its own table.
        if let Some(song_id) = lyric_song_id(&rel) {
            info!(%song_id, "missing lyric, checking whether the song exists");
            let details = state.ncm.fetch_song_details(&[song_id.clone()]).await;
            if details.contains_key(&song_id) {
                db::songs::upsert_song_info(&state.db, &details).await?;
                db::stats::add_no_lyrics_entry(&state.db, &song_id).await?;
            }
        }

        return Err(ApiError::NotFound(rel));
    }

    if target.is_dir() {
        return Ok(Json(list_directory(&target, &rel).await?).into_response());
    }

    if let Some(song_id) = lyric_song_id(&rel) {
        db::stats::record_access(&state.db, &song_id).await?;
        db::stats::remove_no_lyrics_entry(&state.db, &song_id).await?;
    }

    let bytes = tokio::fs::read(&target).await?;
    info!(path = %rel, size = bytes.len(), "served file");
    Ok(([(header::CONTENT_TYPE, content_type_for(&target))], bytes).into_response())
}

async fn list_directory(target: &Path, rel: &str) -> ApiResult<DirListing> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut entries = tokio::fs::read_dir(target).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();

    Ok(DirListing {
        path: rel.to_string(),
        dirs,
        files,
    })
}

/// Join `rel` under `base`, rejecting anything that could escape it
fn resolve_within(base: &Path, rel: &str) -> Option<PathBuf> {
    let rel_path = Path::new(rel);
    for component in rel_path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(base.join(rel_path))
}

/// Extract the song id from an `ncm-lyrics/<digits>.ttml` path
fn lyric_song_id(rel: &str) -> Option<String> {
    let idx = rel.find("ncm-lyrics/")?;
    let tail = &rel[idx + "ncm-lyrics/".len()..];
    let stem = tail.strip_suffix(".ttml")?;
    if !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()) {
        Some(stem.to_string())
    } else {
        None
    }
}

/// Best-effort content type from the file extension
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ttml") | Some("xml") => "application/xml",
        Some("json") | Some("jsonl") => "application/json",
        Some("txt") | Some("md") => "text/plain; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}
