//! Runtime settings, read from `~/.geolinks/config.json`.
//!
//! Every field has a default, so an absent file or a partial file both work.
//! CLI flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Concurrent resolution units per message.
    pub workers: usize,
    /// Overall per-message deadline.
    pub deadline_ms: u64,
    /// Drop candidates closer than this to the primary. `None` keeps them all.
    pub proximity_threshold_m: Option<f64>,
    pub http_timeout_ms: u64,
    pub max_redirect_hops: usize,
    pub user_agent: String,
    pub nominatim_url: String,
    pub timeapi_url: String,
    pub elevation_url: String,
    pub static_map_url: String,
    /// Generic shorteners whose redirect is followed before dispatch.
    pub shortener_hosts: Vec<String>,
    /// Skip every network collaborator.
    pub offline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 4,
            deadline_ms: 8_000,
            proximity_threshold_m: None,
            http_timeout_ms: 5_000,
            max_redirect_hops: 5,
            user_agent: format!("geolinks/{}", env!("CARGO_PKG_VERSION")),
            nominatim_url: "https://nominatim.openstreetmap.org".into(),
            timeapi_url: "https://www.timeapi.io".into(),
            elevation_url: "https://api.open-meteo.com".into(),
            static_map_url: "https://staticmap.openstreetmap.de/staticmap.php".into(),
            shortener_hosts: ["bit.ly", "tinyurl.com", "t.co", "is.gd", "ow.ly", "rb.gy", "cutt.ly"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            offline: false,
        }
    }
}

impl Settings {
    /// Load from the default location, falling back to defaults on any problem.
    pub fn load() -> Self {
        Self::load_or_default(&Self::default_path())
    }

    /// Load from `path`; a missing file is not an error, a broken one is logged.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.workers = settings.workers.max(1);
        Ok(settings)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geolinks")
            .join("config.json")
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// True when `host` (or a parent domain of it) is a configured shortener.
    pub fn is_shortener(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        self.shortener_hosts
            .iter()
            .any(|s| host == s || host.ends_with(&format!(".{}", s)))
    }
}
