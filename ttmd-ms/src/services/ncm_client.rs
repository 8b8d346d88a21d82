//! NCM song-detail API client
//!
//! Looks up song metadata for the numeric ids that appear in lyric file
//! names. The endpoint is an undocumented web API, so the client sends
//! browser-like headers and tolerates both field spellings the API is
//! known to produce (`artists`/`ar`, `album`/`al`).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const NCM_DETAIL_URL: &str = "https://music.163.com/api/song/detail";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const REFERER: &str = "https://music.163.com/";
const RATE_LIMIT_MS: u64 = 500;

/// NCM client errors
#[derive(Debug, Error)]
pub enum NcmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected API response code {0}")]
    BadCode(i64),
}

/// Song metadata as cached in the statistics database
#[derive(Debug, Clone)]
pub struct SongDetails {
    pub song_name: String,
    pub artists: String,
    pub album: String,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    code: i64,
    #[serde(default)]
    songs: Vec<NcmSong>,
}

#[derive(Debug, Deserialize)]
struct NcmSong {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "ar")]
    artists: Vec<NcmArtist>,
    #[serde(default, alias = "al")]
    album: Option<NcmAlbum>,
}

#[derive(Debug, Deserialize)]
struct NcmArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NcmAlbum {
    #[serde(default)]
    name: Option<String>,
}

/// Minimum-interval rate limiter
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// NCM song-detail API client
pub struct NcmClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl NcmClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
        })
    }

    /// Fetch details for a batch of song ids.
    ///
    /// Failures are logged and yield an empty map; metadata lookup is
    /// decoration, never a reason to fail a request.
    pub async fn fetch_song_details(&self, song_ids: &[String]) -> HashMap<String, SongDetails> {
        if song_ids.is_empty() {
            return HashMap::new();
        }
        self.rate_limiter.wait().await;
        match self.try_fetch(song_ids).await {
            Ok(details) => details,
            Err(e) => {
                warn!(error = %e, "song detail request failed");
                HashMap::new()
            }
        }
    }

    async fn try_fetch(
        &self,
        song_ids: &[String],
    ) -> Result<HashMap<String, SongDetails>, NcmError> {
        let url = format!("{}?ids=[{}]", NCM_DETAIL_URL, song_ids.join(","));
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::REFERER, REFERER)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;

        let body: DetailResponse = response.json().await?;
        if body.code != 200 {
            return Err(NcmError::BadCode(body.code));
        }

        Ok(body.songs.into_iter().map(song_to_details).collect())
    }
}

fn song_to_details(song: NcmSong) -> (String, SongDetails) {
    let artists = song
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    (
        song.id.to_string(),
        SongDetails {
            song_name: song.name.unwrap_or_else(|| "N/A".to_string()),
            artists,
            album: song
                .album
                .and_then(|a| a.name)
                .unwrap_or_else(|| "N/A".to_string()),
        },
    )
}
