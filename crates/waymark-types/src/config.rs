//! Configuration loading for waymark.
//!
//! Layered config: defaults -> config file -> CLI config file -> env vars.
//! CLI flags are applied by the caller after `Settings::load` returns.
//! The default config file lives at ~/.config/waymark/config.toml.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Settings for the federated search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Minimum time between throttled re-fetches of empty caches (ms).
    /// The throttle is global across all collections.
    #[serde(default = "default_refresh_throttle_ms")]
    pub refresh_throttle_ms: u64,

    /// Id of the well-known public demo collection.
    #[serde(default = "default_demo_collection_id")]
    pub demo_collection_id: String,

    /// How long a cross-collection selection waits for the target
    /// collection's data before it is abandoned (ms).
    #[serde(default = "default_pending_selection_timeout_ms")]
    pub pending_selection_timeout_ms: u64,

    /// Return every place when the query text is empty.
    #[serde(default = "default_show_all_when_empty")]
    pub show_all_when_empty: bool,

    /// Cap on returned hits. Unlimited when absent.
    #[serde(default)]
    pub result_limit: Option<usize>,
}

/// Upper bound for the throttle and the pending selection timeout: one day.
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

fn default_refresh_throttle_ms() -> u64 {
    5000
}

fn default_demo_collection_id() -> String {
    "demo".to_string()
}

fn default_pending_selection_timeout_ms() -> u64 {
    15_000
}

fn default_show_all_when_empty() -> bool {
    true
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            refresh_throttle_ms: default_refresh_throttle_ms(),
            demo_collection_id: default_demo_collection_id(),
            pending_selection_timeout_ms: default_pending_selection_timeout_ms(),
            show_all_when_empty: default_show_all_when_empty(),
            result_limit: None,
        }
    }
}

impl IndexSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.refresh_throttle_ms == 0 {
            return Err(TypesError::Config("refresh_throttle_ms must be > 0".to_string()));
        }
        if self.refresh_throttle_ms > MAX_INTERVAL_MS {
            return Err(TypesError::Config(format!(
                "refresh_throttle_ms must be <= {}",
                MAX_INTERVAL_MS
            )));
        }
        if self.pending_selection_timeout_ms == 0 {
            return Err(TypesError::Config(
                "pending_selection_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.pending_selection_timeout_ms > MAX_INTERVAL_MS {
            return Err(TypesError::Config(format!(
                "pending_selection_timeout_ms must be <= {}",
                MAX_INTERVAL_MS
            )));
        }
        if self.demo_collection_id.trim().is_empty() {
            return Err(TypesError::Config("demo_collection_id must not be empty".to_string()));
        }
        if self.result_limit == Some(0) {
            return Err(TypesError::Config("result_limit must be > 0".to_string()));
        }
        Ok(())
    }

    /// Throttle window as a chrono duration, clamped to [`MAX_INTERVAL_MS`].
    pub fn refresh_throttle(&self) -> chrono::Duration {
        clamped_millis(self.refresh_throttle_ms)
    }

    /// Pending selection deadline as a chrono duration, clamped to
    /// [`MAX_INTERVAL_MS`].
    pub fn pending_selection_timeout(&self) -> chrono::Duration {
        clamped_millis(self.pending_selection_timeout_ms)
    }
}

fn clamped_millis(ms: u64) -> chrono::Duration {
    // MAX_INTERVAL_MS fits in i64, so the cast cannot wrap negative
    chrono::Duration::milliseconds(ms.min(MAX_INTERVAL_MS) as i64)
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Search index settings
    #[serde(default)]
    pub index: IndexSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            index: IndexSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/waymark/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (WAYMARK_*, nested keys split on `__`)
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "waymark")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("index.refresh_throttle_ms", default_refresh_throttle_ms() as i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("index.demo_collection_id", default_demo_collection_id())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default(
                "index.pending_selection_timeout_ms",
                default_pending_selection_timeout_ms() as i64,
            )
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("index.show_all_when_empty", default_show_all_when_empty())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // WAYMARK_LOG_LEVEL, WAYMARK_INDEX__REFRESH_THROTTLE_MS, ...
        builder = builder.add_source(
            Environment::with_prefix("WAYMARK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        settings.index.validate()?;
        Ok(settings)
    }
}
