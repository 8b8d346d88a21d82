//! Contributors endpoint
//!
//! The mirrored repository carries `metadata/contributors.jsonl`, one
//! JSON object per line with a GitHub id and a contribution count.
//! Display info comes from the one-day database cache, topped up from
//! the GitHub API until its rate limit pushes back.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db;
use crate::db::contributors::ContributorInfo;
use crate::error::{ApiError, ApiResult};
use crate::services::github_client::{GithubError, GithubUser};
use crate::AppState;

/// One contributor as rendered by the caller
#[derive(Debug, Serialize)]
pub struct ContributorEntry {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ContributorsResponse {
    pub contributors: Vec<ContributorEntry>,
    pub rate_limited: bool,
}

/// One line of contributors.jsonl. The id is numeric in some dumps and
/// a string in others.
#[derive(Debug, Deserialize)]
struct ContribLine {
    #[serde(rename = "githubId")]
    github_id: Option<serde_json::Value>,
    #[serde(default)]
    count: i64,
}

/// GET /api/contributors
pub async fn contributors(State(state): State<AppState>) -> ApiResult<Json<ContributorsResponse>> {
    let path = state
        .config
        .mirror_dir()
        .join("metadata")
        .join("contributors.jsonl");
    if !path.exists() {
        return Err(ApiError::NotFound(
            "contributors data file not available".to_string(),
        ));
    }

    let raw = tokio::fs::read_to_string(&path).await?;
    let counts = parse_contributor_lines(&raw);
    let github_ids: Vec<String> = counts.iter().map(|(id, _)| id.clone()).collect();

    let mut cached = db::contributors::get_contributors(&state.db, &github_ids).await?;

    let to_fetch: Vec<String> = github_ids
        .iter()
        .filter(|id| cached.get(*id).map(|info| info.is_stale()).unwrap_or(true))
        .cloned()
        .collect();

    let mut rate_limited = false;
    let mut fetched: HashMap<String, ContributorInfo> = HashMap::new();
    if !to_fetch.is_empty() {
        info!(count = to_fetch.len(), "refreshing contributors from GitHub API");
    }
    for github_id in &to_fetch {
        if rate_limited {
            break;
        }
        match state.github.fetch_user(github_id).await {
            Ok(user) => {
                fetched.insert(github_id.clone(), user_to_info(user));
            }
            Err(GithubError::RateLimited) => {
                warn!("GitHub API rate limit hit, serving cached data");
                rate_limited = true;
            }
            Err(e) => {
                warn!(github_id = %github_id, error = %e, "contributor lookup failed");
            }
        }
    }

    if !fetched.is_empty() {
        db::contributors::upsert_contributors(&state.db, &fetched).await?;
        cached.extend(fetched);
    }

    let mut entries: Vec<ContributorEntry> = counts
        .into_iter()
        .map(|(github_id, count)| match cached.get(&github_id) {
            Some(info) => ContributorEntry {
                login: info
                    .login
                    .clone()
                    .unwrap_or_else(|| format!("ID: {github_id}")),
                name: info.name.clone(),
                avatar_url: info.avatar_url.clone(),
                count,
            },
            None => ContributorEntry {
                login: format!("ID: {github_id}"),
                name: None,
                avatar_url: None,
                count,
            },
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(Json(ContributorsResponse {
        contributors: entries,
        rate_limited,
    }))
}

fn user_to_info(user: GithubUser) -> ContributorInfo {
    ContributorInfo {
        login: user.login,
        name: user.name,
        avatar_url: user.avatar_url,
        last_updated: None,
    }
}

/// Parse the jsonl dump, ignoring malformed lines. Later lines win on
/// duplicate ids.
fn parse_contributor_lines(raw: &str) -> Vec<(String, i64)> {
    let mut counts: Vec<(String, i64)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ContribLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "skipping malformed contributors line");
                continue;
            }
        };
        let Some(id_value) = parsed.github_id else {
            continue;
        };
        let github_id = match id_value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            _ => continue,
        };
        match seen.get(&github_id) {
            Some(&idx) => counts[idx].1 = parsed.count,
            None => {
                seen.insert(github_id.clone(), counts.len());
                counts.push((github_id, parsed.count));
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_string_ids() {
        let raw = concat!(
            r#"{"githubId": 123, "count": 10}"#,
            "\n",
            r#"{"githubId": "456", "count": 3}"#,
            "\n",
        );
        let counts = parse_contributor_lines(raw);
        assert_eq!(
            counts,
            vec![("123".to_string(), 10), ("456".to_string(), 3)]
        );
    }

    #[test]
    fn malformed_and_idless_lines_are_skipped() {
        let raw = concat!(
            "not json\n",
            r#"{"count": 5}"#,
            "\n",
            "\n",
            r#"{"githubId": 1, "count": 2}"#,
            "\n",
        );
        let counts = parse_contributor_lines(raw);
        assert_eq!(counts, vec![("1".to_string(), 2)]);
    }

    #[test]
    fn duplicate_ids_keep_the_last_count() {
        let raw = concat!(
            r#"{"githubId": 1, "count": 2}"#,
            "\n",
            r#"{"githubId": 1, "count": 9}"#,
            "\n",
        );
        let counts = parse_contributor_lines(raw);
        assert_eq!(counts, vec![("1".to_string(), 9)]);
    }
}
