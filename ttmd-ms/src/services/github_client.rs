//! GitHub user API client
//!
//! Resolves contributor display info by numeric GitHub id. The
//! unauthenticated API is heavily rate limited, so 403/429 is a
//! distinct error the caller uses to stop issuing further lookups for
//! the current request.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const GITHUB_USER_URL: &str = "https://api.github.com/user";
const USER_AGENT: &str = concat!("ttmd/", env!("CARGO_PKG_VERSION"));

/// GitHub client errors
#[derive(Debug, Error)]
pub enum GithubError {
    /// 403/429: stop issuing lookups for now
    #[error("GitHub API rate limit exceeded")]
    RateLimited,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {0}")]
    Api(u16),
}

/// Subset of the user payload the contributors page needs
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// GitHub user API client
pub struct GithubClient {
    http: reqwest::Client,
}

impl GithubClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        // GitHub rejects requests without a User-Agent
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http })
    }

    /// Look up one user by numeric id
    pub async fn fetch_user(&self, github_id: &str) -> Result<GithubUser, GithubError> {
        let url = format!("{GITHUB_USER_URL}/{github_id}");
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(GithubError::RateLimited);
        }
        if !status.is_success() {
            return Err(GithubError::Api(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}
