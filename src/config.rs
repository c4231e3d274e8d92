//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::aggregate::DayZone;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub goals: GoalsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Durable session slot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_token_file")]
    pub token_file: String,
}

fn default_token_file() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("fitmanager").join("session.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./fitmanager_session.json".to_string())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

impl SessionConfig {
    /// Token file path with a leading `~` expanded
    pub fn token_path(&self) -> PathBuf {
        match self.token_file.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.token_file)),
            None => PathBuf::from(&self.token_file),
        }
    }
}

/// Presentation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// `local`, `utc` or a fixed offset such as `+02:00`
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "local".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl DisplayConfig {
    /// Day zone for aggregation; unparseable values fall back to local time
    pub fn day_zone(&self) -> DayZone {
        match self.timezone.parse() {
            Ok(zone) => zone,
            Err(e) => {
                tracing::warn!("{}; using local time", e);
                DayZone::Local
            }
        }
    }
}

/// Hydration goals (ml)
#[derive(Debug, Clone, Deserialize)]
pub struct GoalsConfig {
    /// Full scale of the dashboard progress bar
    #[serde(default = "default_hydration_scale")]
    pub hydration_scale_ml: f64,

    /// Full scale of the hydration page progress bar
    #[serde(default = "default_hydration_page_scale")]
    pub hydration_page_scale_ml: f64,

    /// Recommended daily intake shown next to the progress bar
    #[serde(default = "default_hydration_recommended")]
    pub hydration_recommended_ml: f64,
}

fn default_hydration_scale() -> f64 {
    3000.0
}

fn default_hydration_page_scale() -> f64 {
    4000.0
}

fn default_hydration_recommended() -> f64 {
    2000.0
}

impl Default for GoalsConfig {
    fn default() -> Self {
        Self {
            hydration_scale_ml: default_hydration_scale(),
            hydration_page_scale_ml: default_hydration_page_scale(),
            hydration_recommended_ml: default_hydration_recommended(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("fitmanager").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `FITMANAGER_*` overrides read through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(url) = lookup("FITMANAGER_API_URL") {
            self.api.base_url = url;
        }
        if let Some(timeout) = lookup("FITMANAGER_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.api.request_timeout_secs = t;
            }
        }

        // Session overrides
        if let Some(file) = lookup("FITMANAGER_SESSION_FILE") {
            self.session.token_file = file;
        }

        // Display overrides
        if let Some(tz) = lookup("FITMANAGER_TIMEZONE") {
            self.display.timezone = tz;
        }

        // Logging overrides
        if let Some(level) = lookup("FITMANAGER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("FITMANAGER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# FitManager Configuration
#
# Environment variables override these settings:
# - FITMANAGER_API_URL
# - FITMANAGER_TIMEOUT_SECS
# - FITMANAGER_SESSION_FILE
# - FITMANAGER_TIMEZONE
# - FITMANAGER_LOG_LEVEL
# - FITMANAGER_LOG_FORMAT

[api]
# Base URL of the FitManager API
base_url = "http://localhost:5000"

# Request timeout in seconds
request_timeout_secs = 30

[session]
# File holding the session token
token_file = "~/.local/share/fitmanager/session.json"

[display]
# Zone used to cut entries into days: local, utc or an offset like "+02:00"
timezone = "local"

[goals]
# Full scale of the dashboard hydration bar (ml)
hydration_scale_ml = 3000

# Full scale of the hydration page bar (ml)
hydration_page_scale_ml = 4000

# Recommended daily intake (ml)
hydration_recommended_ml = 2000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.goals.hydration_scale_ml, 3000.0);
        assert_eq!(config.display.day_zone(), DayZone::Local);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://fit.example.com\"\n\n[display]\ntimezone = \"+01:00\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://fit.example.com");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert!(matches!(config.display.day_zone(), DayZone::Fixed(_)));
        assert_eq!(config.goals.hydration_page_scale_ml, 4000.0);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[api\nbase_url = 1").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FITMANAGER_API_URL", "http://api.test"),
            ("FITMANAGER_TIMEOUT_SECS", "not-a-number"),
            ("FITMANAGER_TIMEZONE", "utc"),
            ("FITMANAGER_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "http://api.test");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.display.day_zone(), DayZone::Utc);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_bad_timezone_falls_back_to_local() {
        let display = DisplayConfig {
            timezone: "Mars/Olympus".to_string(),
        };
        assert_eq!(display.day_zone(), DayZone::Local);
    }
}
