//! Proxy selection policy
//!
//! A reinforcement/penalty scheme over the credit map: a success
//! increments an endpoint's credit, any failure zeroes it. Selection
//! always takes the highest positive credit, so a single failure drops
//! an endpoint to the bottom until it succeeds again or the whole field
//! is reset. Deliberately not a sliding-window average: with a small,
//! mostly static proxy set, fast convergence beats nuance.
//!
//! The decision functions are pure and operate on plain values; the
//! [`ProxySelector`] owns the map and persists after every mutation.

use tracing::{debug, info, warn};

use super::health::{ProxyCredits, ProxyHealthStore};

/// Endpoint with the strictly highest positive credit.
///
/// Ties break to the first endpoint in configured order that reaches
/// the maximum. Returns `None` when no endpoint has positive credit.
pub fn best_candidate<'a>(mirrors: &'a [String], credits: &ProxyCredits) -> Option<&'a str> {
    let mut best: Option<(&str, u32)> = None;
    for mirror in mirrors {
        let credit = credits.get(mirror.as_str()).copied().unwrap_or(0);
        if credit == 0 {
            continue;
        }
        let better = match best {
            Some((_, top)) => credit > top,
            None => true,
        };
        if better {
            best = Some((mirror.as_str(), credit));
        }
    }
    best.map(|(mirror, _)| mirror)
}

/// Apply one attempt outcome: success increments, failure zeroes.
///
/// Endpoints that are not in the map are ignored; the set is fixed at
/// configuration time.
pub fn apply_outcome(credits: &mut ProxyCredits, endpoint: &str, success: bool) {
    if let Some(credit) = credits.get_mut(endpoint) {
        *credit = if success { credit.saturating_add(1) } else { 0 };
    }
}

/// Give every configured endpoint a fresh credit of 1
pub fn reset_credits(mirrors: &[String], credits: &mut ProxyCredits) {
    for mirror in mirrors {
        credits.insert(mirror.clone(), 1);
    }
}

/// Stateful selector: credit map plus write-through persistence
pub struct ProxySelector {
    store: ProxyHealthStore,
    credits: ProxyCredits,
}

impl ProxySelector {
    /// Load persisted credits through the given store
    pub fn new(store: ProxyHealthStore) -> Self {
        let credits = store.load();
        Self { store, credits }
    }

    /// Pick the endpoint with the highest credit.
    ///
    /// When every endpoint is exhausted the whole field is reset to 1,
    /// persisted, and selection retried once, so this returns `None`
    /// only when no endpoints are configured at all.
    pub fn pick_best(&mut self) -> Option<String> {
        if let Some(mirror) = best_candidate(self.store.mirrors(), &self.credits) {
            debug!(mirror, credit = self.credits[mirror], "selected proxy");
            return Some(mirror.to_string());
        }
        if self.store.mirrors().is_empty() {
            return None;
        }
        warn!("no proxy endpoint has positive credit, resetting all");
        reset_credits(self.store.mirrors(), &mut self.credits);
        self.store.save(&self.credits);
        best_candidate(self.store.mirrors(), &self.credits).map(str::to_string)
    }

    /// Record an attempt outcome and persist the updated map
    pub fn record_outcome(&mut self, endpoint: &str, success: bool) {
        apply_outcome(&mut self.credits, endpoint, success);
        let credit = self.credits.get(endpoint).copied().unwrap_or(0);
        if success {
            info!(endpoint, credit, "proxy succeeded");
        } else {
            warn!(endpoint, "proxy failed, credit zeroed");
        }
        self.store.save(&self.credits);
    }

    /// Current credit map
    pub fn credits(&self) -> &ProxyCredits {
        &self.credits
    }
}
