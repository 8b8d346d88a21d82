//! Background synchronization scheduler
//!
//! A single long-lived task: run a pass, publish the outcome snapshot,
//! sleep the configured interval, repeat forever. HTTP readers only
//! ever see the snapshot of a fully completed pass; nothing here can
//! terminate the loop or the process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use super::health::ProxyCredits;
use super::selector::ProxySelector;
use super::transport::RepositoryTransport;
use super::updater::{RepositoryUpdater, SyncOutcome};

/// Result of the most recent synchronization pass
#[derive(Debug, Clone, Serialize)]
pub struct SyncSnapshot {
    /// Wall-clock completion time, `N/A` before the first pass
    pub last_update_time: String,
    /// Status tag of the last pass, `N/A` before the first pass
    pub last_update_status: String,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            last_update_time: "N/A".to_string(),
            last_update_status: "N/A".to_string(),
        }
    }
}

/// Shared read-only view of the sync engine for the HTTP layer.
///
/// Both fields are replaced wholesale after a pass reaches its terminal
/// state, so readers never observe a half-written outcome.
#[derive(Clone)]
pub struct SyncState {
    snapshot: Arc<RwLock<SyncSnapshot>>,
    credits: Arc<RwLock<ProxyCredits>>,
}

impl SyncState {
    pub fn new(initial_credits: ProxyCredits) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(SyncSnapshot::default())),
            credits: Arc::new(RwLock::new(initial_credits)),
        }
    }

    /// Last completed pass
    pub async fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Current proxy credit map (eventually consistent)
    pub async fn proxy_credits(&self) -> ProxyCredits {
        self.credits.read().await.clone()
    }

    async fn publish(&self, outcome: &SyncOutcome, credits: &ProxyCredits) {
        *self.snapshot.write().await = SyncSnapshot {
            last_update_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            last_update_status: outcome.tag(),
        };
        *self.credits.write().await = credits.clone();
    }
}

/// Run the scheduler loop forever
pub async fn run<T: RepositoryTransport>(
    updater: RepositoryUpdater<T>,
    mut selector: ProxySelector,
    state: SyncState,
    interval: Duration,
) {
    info!(interval_secs = interval.as_secs(), "background updater started");
    loop {
        info!("starting scheduled repository sync");
        let outcome = updater.run_pass(&mut selector).await;
        state.publish(&outcome, selector.credits()).await;
        info!(
            status = %outcome,
            next_in_secs = interval.as_secs(),
            "sync pass finished"
        );
        tokio::time::sleep(interval).await;
    }
}
