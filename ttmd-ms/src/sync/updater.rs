//! Repository update state machine
//!
//! One synchronization pass either clones a missing working copy or
//! updates an existing one, falling back to delete-and-reclone when the
//! update sequence cannot be completed. Every terminal condition is
//! captured as a [`SyncOutcome`]; nothing in here raises to the caller,
//! so the scheduler loop can never be taken down by a bad pass.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};
use ttmd_common::config::MirrorConfig;

use super::fsops;
use super::selector::ProxySelector;
use super::transport::RepositoryTransport;

/// Time budget for a shallow clone
const CLONE_BUDGET: Duration = Duration::from_secs(300);
/// Time budget for each of fetch, reset and pull
const UPDATE_BUDGET: Duration = Duration::from_secs(120);

/// Terminal result of one synchronization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fresh working copy cloned
    Cloned,
    /// Every clone path failed; no working copy exists
    CloneFailed,
    /// Existing working copy brought up to date
    Updated,
    /// Update failed, working copy deleted and recloned
    UpdateFailedRecloned,
    /// Update failed and the recovery clone failed too
    UpdateFailedRecloneFailed,
    /// Update failed and the corrupt working copy could not be deleted;
    /// it is left in place for the next pass to retry
    DeleteFailed(String),
}

impl SyncOutcome {
    /// Status tag as exposed through the HTTP layer
    pub fn tag(&self) -> String {
        match self {
            SyncOutcome::Cloned => "cloned".to_string(),
            SyncOutcome::CloneFailed => "clone-failed".to_string(),
            SyncOutcome::Updated => "updated".to_string(),
            SyncOutcome::UpdateFailedRecloned => "update-failed-recloned".to_string(),
            SyncOutcome::UpdateFailedRecloneFailed => {
                "update-failed-reclone-failed".to_string()
            }
            SyncOutcome::DeleteFailed(reason) => format!("delete-failed:{reason}"),
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Drives one synchronization pass over a [`RepositoryTransport`]
pub struct RepositoryUpdater<T: RepositoryTransport> {
    transport: T,
    origin_url: String,
    repo_user: String,
    repo_name: String,
    default_branch: String,
    workdir: PathBuf,
}

impl<T: RepositoryTransport> RepositoryUpdater<T> {
    pub fn new(transport: T, config: &MirrorConfig) -> Self {
        Self {
            transport,
            origin_url: config.origin_url.clone(),
            repo_user: config.repo_user.clone(),
            repo_name: config.repo_name.clone(),
            default_branch: config.default_branch.clone(),
            workdir: config.mirror_dir(),
        }
    }

    /// Run one synchronization pass.
    ///
    /// A pass entered with the working copy absent can only end in
    /// `cloned` or `clone-failed`; a pass entered with it present ends
    /// in one of the update outcomes.
    pub async fn run_pass(&self, selector: &mut ProxySelector) -> SyncOutcome {
        if self.workdir.exists() {
            self.update_flow(selector).await
        } else {
            info!(dir = %self.workdir.display(), "working copy absent, cloning");
            if self.clone_flow(selector).await {
                SyncOutcome::Cloned
            } else {
                SyncOutcome::CloneFailed
            }
        }
    }

    async fn update_flow(&self, selector: &mut ProxySelector) -> SyncOutcome {
        self.clear_stale_lock();

        if self.try_update().await {
            info!("repository updated");
            return SyncOutcome::Updated;
        }

        warn!("update failed, deleting working copy for reclone");
        if let Err(e) = fsops::force_remove(&self.workdir) {
            error!(error = %e, dir = %self.workdir.display(), "failed to delete working copy");
            return SyncOutcome::DeleteFailed(e.to_string());
        }

        if self.clone_flow(selector).await {
            SyncOutcome::UpdateFailedRecloned
        } else {
            SyncOutcome::UpdateFailedRecloneFailed
        }
    }

    /// Remove an index lock left behind by an interrupted run, so the
    /// update can proceed without operator intervention.
    fn clear_stale_lock(&self) {
        let lock = self.workdir.join(".git").join("index.lock");
        if lock.exists() {
            warn!(lock = %lock.display(), "removing stale index lock");
            if let Err(e) = std::fs::remove_file(&lock) {
                warn!(error = %e, "could not remove stale index lock");
            }
        }
    }

    /// Fetch, hard-reset to the remote default branch, then pull. All
    /// three must succeed for the pass to count as an update.
    async fn try_update(&self) -> bool {
        if let Err(e) = self.transport.fetch_all(&self.workdir, UPDATE_BUDGET).await {
            warn!(error = %e, "fetch failed");
            return false;
        }
        let refspec = format!("origin/{}", self.default_branch);
        if let Err(e) = self
            .transport
            .reset_hard(&self.workdir, &refspec, UPDATE_BUDGET)
            .await
        {
            warn!(error = %e, "hard reset failed");
            return false;
        }
        if let Err(e) = self.transport.pull(&self.workdir, UPDATE_BUDGET).await {
            warn!(error = %e, "pull failed");
            return false;
        }
        true
    }

    /// Try the ranked proxies, then the direct origin URL.
    ///
    /// Each proxy failure zeroes that endpoint's credit, so selection
    /// walks through distinct endpoints. A reset can hand back an
    /// endpoint this pass already burned; that ends the sweep and falls
    /// through to the direct path instead of spinning.
    async fn clone_flow(&self, selector: &mut ProxySelector) -> bool {
        let mut tried: HashSet<String> = HashSet::new();

        loop {
            let Some(mirror) = selector.pick_best() else {
                break;
            };
            if !tried.insert(mirror.clone()) {
                break;
            }

            let url = self.proxied_url(&mirror);
            info!(url = %url, "attempting clone via proxy");
            match self
                .transport
                .clone_shallow(&url, &self.workdir, CLONE_BUDGET)
                .await
            {
                Ok(()) => {
                    info!(url = %url, "clone succeeded");
                    selector.record_outcome(&mirror, true);
                    return true;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "proxy clone failed");
                    selector.record_outcome(&mirror, false);
                    self.discard_partial_clone();
                }
            }
        }

        info!("all proxies failed, attempting direct clone from origin");
        match self
            .transport
            .clone_shallow(&self.origin_url, &self.workdir, CLONE_BUDGET)
            .await
        {
            Ok(()) => {
                info!("cloned from origin");
                true
            }
            Err(e) => {
                error!(error = %e, "direct clone failed");
                self.discard_partial_clone();
                false
            }
        }
    }

    /// A failed or timed-out clone can leave a half-written directory;
    /// the next attempt must start clean.
    fn discard_partial_clone(&self) {
        if self.workdir.exists() {
            if let Err(e) = fsops::force_remove(&self.workdir) {
                warn!(error = %e, "could not discard partial clone");
            }
        }
    }

    /// Build the clone URL for a proxy endpoint.
    ///
    /// gitclone.com and fastgit rewrite the repository path into their
    /// own host; every other endpoint is a prefix ahead of the full
    /// origin URL.
    fn proxied_url(&self, mirror: &str) -> String {
        let repo_path = format!("{}/{}.git", self.repo_user, self.repo_name);
        if mirror.contains("gitclone.com") {
            return format!("https://gitclone.com/github.com/{repo_path}");
        }
        if mirror.contains("hub.fastgit.xyz") {
            return format!("https://hub.fastgit.xyz/{repo_path}");
        }
        format!("{mirror}https://github.com/{repo_path}")
    }
}
