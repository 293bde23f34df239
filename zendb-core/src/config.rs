//! Synchronizer configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.zendb/
//!   config.yaml   (default location; any path may be passed explicitly)
//! ```
//!
//! Files ending in `.json` are parsed as JSON, everything else as YAML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Interval used when `schedule.interval_secs` is omitted.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub zendesk: ZendeskConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Raw statements run verbatim after every pass.
    #[serde(default)]
    pub post_process: Vec<String>,
}

/// Source connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZendeskConfig {
    /// Account subdomain; expands to `https://<subdomain>.zendesk.com/api/v2/`.
    #[serde(default)]
    pub subdomain: Option<String>,
    /// Explicit API base URL, takes precedence over `subdomain`.
    #[serde(default)]
    pub url: Option<String>,
    pub user: String,
    pub token: String,
}

impl ZendeskConfig {
    /// API base URL, always ending in `/`.
    pub fn base_url(&self) -> Option<String> {
        let raw = match (&self.url, &self.subdomain) {
            (Some(url), _) => url.clone(),
            (None, Some(subdomain)) => format!("https://{subdomain}.zendesk.com/api/v2/"),
            (None, None) => return None,
        };
        if raw.ends_with('/') {
            Some(raw)
        } else {
            Some(format!("{raw}/"))
        }
    }
}

/// What the importer does when an insert violates a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Log the row as failed and move on.
    #[default]
    Skip,
    /// Retry the row as an update matched on its key column.
    Update,
}

/// Sink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file; created on first open.
    pub path: PathBuf,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl Config {
    /// Parse and validate a config document. `is_json` selects the format.
    pub fn parse(path: &Path, contents: &str, is_json: bool) -> Result<Self, ConfigError> {
        let config: Config = if is_json {
            serde_json::from_str(contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "schedule.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.zendesk.base_url().is_none() {
            return Err(ConfigError::Invalid(
                "zendesk needs either `subdomain` or `url`".to_string(),
            ));
        }
        if self.post_process.iter().any(|stmt| stmt.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "post_process entries must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// `<home>/.zendb/config.yaml`: pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(".zendb").join("config.yaml")
}

/// `default_path_at` convenience wrapper.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(default_path_at(&home))
}

/// Load and validate the config file at `path`.
///
/// Returns `ConfigError::NotFound` if absent, a parse error with path context
/// if malformed, and `ConfigError::Invalid` if values are out of range.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    Config::parse(path, &contents, is_json)
}
