//! Repository transport
//!
//! Narrow capability interface over the remote operations the updater
//! needs, so the state machine can be exercised against a scripted
//! implementation in tests. The production implementation shells out to
//! the `git` binary with a per-operation time budget.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Transport operation failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// The operation exited non-zero
    #[error("git {op} exited with {code:?}: {stderr}")]
    Failed {
        op: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    /// The operation exceeded its time budget
    #[error("git {op} timed out after {budget:?}")]
    TimedOut {
        op: &'static str,
        budget: Duration,
    },

    /// The git process could not be spawned
    #[error("failed to run git {op}: {source}")]
    Spawn {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type TransportResult = std::result::Result<(), TransportError>;

/// Remote operations on the mirrored repository
#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    /// Shallow-clone `url` into `dest`
    async fn clone_shallow(&self, url: &str, dest: &Path, budget: Duration) -> TransportResult;

    /// Fetch all remote refs for the working copy at `workdir`
    async fn fetch_all(&self, workdir: &Path, budget: Duration) -> TransportResult;

    /// Hard-reset the working copy to `refspec`
    async fn reset_hard(&self, workdir: &Path, refspec: &str, budget: Duration)
        -> TransportResult;

    /// Pull the current branch
    async fn pull(&self, workdir: &Path, budget: Duration) -> TransportResult;
}

/// `git` command-line transport
pub struct GitCli;

impl GitCli {
    async fn run(op: &'static str, mut cmd: Command, budget: Duration) -> TransportResult {
        // kill_on_drop: a timed-out child must not keep mutating the
        // working copy after the operation is abandoned.
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        debug!(op, ?budget, "running git");

        match tokio::time::timeout(budget, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => Err(TransportError::Failed {
                op,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Ok(Err(source)) => Err(TransportError::Spawn { op, source }),
            Err(_) => Err(TransportError::TimedOut { op, budget }),
        }
    }
}

#[async_trait]
impl RepositoryTransport for GitCli {
    async fn clone_shallow(&self, url: &str, dest: &Path, budget: Duration) -> TransportResult {
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg("--depth=1").arg(url).arg(dest);
        Self::run("clone", cmd, budget).await
    }

    async fn fetch_all(&self, workdir: &Path, budget: Duration) -> TransportResult {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(workdir).arg("fetch").arg("--all");
        Self::run("fetch", cmd, budget).await
    }

    async fn reset_hard(
        &self,
        workdir: &Path,
        refspec: &str,
        budget: Duration,
    ) -> TransportResult {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(workdir).arg("reset").arg("--hard").arg(refspec);
        Self::run("reset", cmd, budget).await
    }

    async fn pull(&self, workdir: &Path, budget: Duration) -> TransportResult {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(workdir).arg("pull");
        Self::run("pull", cmd, budget).await
    }
}
