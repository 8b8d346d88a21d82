//! Configuration loading and root folder resolution
//!
//! Runtime configuration is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Only the root folder participates in tiers 1 and 2; everything else
//! comes from the TOML file or the compiled defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DEFAULT_ORIGIN_URL: &str = "https://github.com/Steve-xmh/amll-ttml-db.git";
const DEFAULT_REPO_USER: &str = "Steve-xmh";
const DEFAULT_REPO_NAME: &str = "amll-ttml-db";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 600;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TTMD_ROOT_FOLDER";

/// On-disk TOML configuration. Every field is optional; compiled
/// defaults fill the gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub origin_url: Option<String>,
    pub repo_user: Option<String>,
    pub repo_name: Option<String>,
    pub default_branch: Option<String>,
    pub mirrors: Option<Vec<String>>,
    pub update_interval_secs: Option<u64>,
    pub bind_addr: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Root data folder holding the working copy, database and log file
    pub root_folder: PathBuf,
    /// Unproxied origin repository URL
    pub origin_url: String,
    /// Repository owner on the origin host
    pub repo_user: String,
    /// Repository name on the origin host
    pub repo_name: String,
    /// Remote branch the working copy is reset to
    pub default_branch: String,
    /// Proxy endpoint URL templates, in configured order
    pub mirrors: Vec<String>,
    /// Pause between synchronization passes
    pub update_interval: Duration,
    /// HTTP listen address
    pub bind_addr: String,
}

impl MirrorConfig {
    /// Resolve the runtime configuration from CLI arguments, the
    /// environment and the TOML config file.
    ///
    /// A `--config` path that exists but cannot be parsed is an error;
    /// a missing default config file silently falls back to defaults.
    pub fn resolve(cli_root: Option<&str>, cli_config: Option<&Path>) -> Result<Self> {
        let config_file = match cli_config {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file(),
        };

        let toml_config = match config_file {
            Some(ref path) if path.exists() => load_toml(path)?,
            _ => TomlConfig::default(),
        };

        Ok(Self::from_parts(cli_root, &toml_config))
    }

    fn from_parts(cli_root: Option<&str>, toml_config: &TomlConfig) -> Self {
        // Root folder: CLI -> ENV -> TOML -> platform default
        let root_folder = if let Some(path) = cli_root {
            PathBuf::from(path)
        } else if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            PathBuf::from(path)
        } else if let Some(path) = &toml_config.root_folder {
            PathBuf::from(path)
        } else {
            default_root_folder()
        };

        Self {
            root_folder,
            origin_url: toml_config
                .origin_url
                .clone()
                .unwrap_or_else(|| DEFAULT_ORIGIN_URL.to_string()),
            repo_user: toml_config
                .repo_user
                .clone()
                .unwrap_or_else(|| DEFAULT_REPO_USER.to_string()),
            repo_name: toml_config
                .repo_name
                .clone()
                .unwrap_or_else(|| DEFAULT_REPO_NAME.to_string()),
            default_branch: toml_config
                .default_branch
                .clone()
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            mirrors: toml_config.mirrors.clone().unwrap_or_else(default_mirrors),
            update_interval: Duration::from_secs(
                toml_config
                    .update_interval_secs
                    .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS),
            ),
            bind_addr: toml_config
                .bind_addr
                .clone()
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        }
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_root_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    /// Local working copy of the mirrored repository
    pub fn mirror_dir(&self) -> PathBuf {
        self.root_folder.join("db_mirror")
    }

    /// Statistics database file
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("stats.db")
    }

    /// Persisted proxy health scoreboard
    pub fn proxy_status_path(&self) -> PathBuf {
        self.root_folder.join("proxy_status.json")
    }

    /// Service log file served back over HTTP
    pub fn log_path(&self) -> PathBuf {
        self.root_folder.join("ttmd.log")
    }
}

/// Default proxy endpoint list
pub fn default_mirrors() -> Vec<String> {
    [
        "https://ghproxy.com/",
        "https://github.91chi.fun/",
        "https://gh.api.99988866.xyz/",
        "https://mirror.ghproxy.com/",
        "https://gh.con.sh/",
        "https://hub.fastgit.xyz/",
        "https://gitclone.com/",
        "https://github.moeyy.xyz/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn load_toml(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
}

/// Default configuration file path for the platform
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ttmd").join("config.toml"))
}

/// Platform-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ttmd"))
        .unwrap_or_else(|| PathBuf::from("./ttmd_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_empty_toml() {
        let config = MirrorConfig::from_parts(Some("/tmp/ttmd-test"), &TomlConfig::default());
        assert_eq!(config.origin_url, DEFAULT_ORIGIN_URL);
        assert_eq!(config.repo_user, "Steve-xmh");
        assert_eq!(config.repo_name, "amll-ttml-db");
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.update_interval, Duration::from_secs(600));
        assert_eq!(config.mirrors.len(), 8);
    }

    #[test]
    fn cli_root_wins_over_toml() {
        let toml_config = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..TomlConfig::default()
        };
        let config = MirrorConfig::from_parts(Some("/from/cli"), &toml_config);
        assert_eq!(config.root_folder, PathBuf::from("/from/cli"));
    }

    #[test]
    fn derived_paths_live_under_root() {
        let config = MirrorConfig::from_parts(Some("/data/ttmd"), &TomlConfig::default());
        assert_eq!(config.mirror_dir(), PathBuf::from("/data/ttmd/db_mirror"));
        assert_eq!(config.database_path(), PathBuf::from("/data/ttmd/stats.db"));
        assert_eq!(
            config.proxy_status_path(),
            PathBuf::from("/data/ttmd/proxy_status.json")
        );
        assert_eq!(config.log_path(), PathBuf::from("/data/ttmd/ttmd.log"));
    }
}
