//! Persisted proxy health scoreboard
//!
//! Maps every configured proxy endpoint to a non-negative credit
//! counter. The map is loaded once at startup and written back whole
//! after every mutation, so a restart loses at most the in-flight
//! attempt, never committed history.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

/// Endpoint URL template -> credit
pub type ProxyCredits = HashMap<String, u32>;

/// Load/save adapter for the proxy credit map
pub struct ProxyHealthStore {
    path: PathBuf,
    mirrors: Vec<String>,
}

impl ProxyHealthStore {
    pub fn new(path: PathBuf, mirrors: Vec<String>) -> Self {
        Self { path, mirrors }
    }

    /// Configured endpoint list, in selection-priority order
    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Read persisted credits.
    ///
    /// A missing file seeds every configured endpoint with credit 1 so a
    /// first run has candidates. An unreadable or malformed file falls
    /// back to the same seeded default: this is a cache and must never
    /// block startup. Endpoints added to the configuration since the
    /// last run are backfilled with credit 0. The result is written
    /// straight back so the file always reflects the full endpoint set.
    pub fn load(&self) -> ProxyCredits {
        let credits = match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<ProxyCredits>(&raw) {
                Ok(mut map) => {
                    for mirror in &self.mirrors {
                        map.entry(mirror.clone()).or_insert(0);
                    }
                    map
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "proxy status file is malformed, reseeding"
                    );
                    self.seeded()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.seeded(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "proxy status file is unreadable, reseeding"
                );
                self.seeded()
            }
        };
        self.save(&credits);
        credits
    }

    /// Overwrite persisted state.
    ///
    /// Atomic with respect to readers: the map is serialized to a temp
    /// file and renamed into place, so no reader can observe a partial
    /// map. Failures are logged and swallowed; the in-memory map stays
    /// authoritative for the rest of the process lifetime.
    pub fn save(&self, credits: &ProxyCredits) {
        if let Err(e) = self.try_save(credits) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to persist proxy status"
            );
        }
    }

    fn try_save(&self, credits: &ProxyCredits) -> io::Result<()> {
        let raw = serde_json::to_string_pretty(credits)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)
    }

    fn seeded(&self) -> ProxyCredits {
        self.mirrors.iter().map(|m| (m.clone(), 1)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirrors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_seeds_all_endpoints_with_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProxyHealthStore::new(dir.path().join("status.json"), mirrors(&["a", "b"]));

        let credits = store.load();
        assert_eq!(credits.get("a"), Some(&1));
        assert_eq!(credits.get("b"), Some(&1));
        // load() writes the seeded map through
        assert!(dir.path().join("status.json").exists());
    }

    #[test]
    fn load_backfills_new_endpoints_with_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        fs::write(&path, r#"{"a": 5}"#).unwrap();

        let store = ProxyHealthStore::new(path, mirrors(&["a", "b"]));
        let credits = store.load();
        assert_eq!(credits.get("a"), Some(&5));
        assert_eq!(credits.get("b"), Some(&0));
    }

    #[test]
    fn malformed_file_falls_back_to_seeded_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        fs::write(&path, "not json at all").unwrap();

        let store = ProxyHealthStore::new(path, mirrors(&["a"]));
        let credits = store.load();
        assert_eq!(credits.get("a"), Some(&1));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProxyHealthStore::new(dir.path().join("status.json"), mirrors(&["a", "b"]));

        let mut credits = store.load();
        credits.insert("a".to_string(), 7);
        credits.insert("b".to_string(), 0);
        store.save(&credits);

        let reloaded = store.load();
        assert_eq!(reloaded.get("a"), Some(&7));
        assert_eq!(reloaded.get("b"), Some(&0));
    }
}
