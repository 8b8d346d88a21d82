//! Mirror synchronization engine
//!
//! Keeps the local working copy of the lyric repository up to date
//! despite an unreliable direct network path, by routing clone and
//! update operations through a ranked set of fallback proxies, tracking
//! proxy health across restarts, and recovering from partial or
//! corrupted local state.
//!
//! One background task owns the whole engine; the HTTP layer only ever
//! reads snapshots published after a pass completes.

pub mod fsops;
pub mod health;
pub mod scheduler;
pub mod selector;
pub mod transport;
pub mod updater;

pub use health::{ProxyCredits, ProxyHealthStore};
pub use scheduler::{SyncSnapshot, SyncState};
pub use selector::ProxySelector;
pub use transport::{GitCli, RepositoryTransport, TransportError, TransportResult};
pub use updater::{RepositoryUpdater, SyncOutcome};
