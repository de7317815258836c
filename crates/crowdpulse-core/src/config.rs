//! Configuration management for the `CrowdPulse` dashboard

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CROWDPULSE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Session persistence configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Dashboard view configuration
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Realtime channel configuration
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API, including any `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// URL of the realtime websocket endpoint
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File holding the session token and site id
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

/// Dashboard view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Seconds between REST snapshot refreshes in watch mode
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Maximum number of alerts kept in the feed
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,

    /// Records per page in the entries view
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Offset from UTC, in minutes, used for chart labels
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Realtime channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Subscribe to push events in watch mode
    #[serde(default = "default_realtime_enabled")]
    pub enabled: bool,

    /// Delay before reconnecting a dropped socket, in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Consecutive failed connection attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Buffered events per subscriber
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log to file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_realtime_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".crowdpulse").join("session.json")
}

const fn default_refresh_interval() -> u64 {
    60
}

const fn default_max_alerts() -> usize {
    50
}

const fn default_page_size() -> u32 {
    10
}

const fn default_realtime_enabled() -> bool {
    true
}

const fn default_reconnect_delay_ms() -> u64 {
    2000
}

const fn default_max_reconnect_attempts() -> u32 {
    5
}

const fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            realtime_url: default_realtime_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            max_alerts: default_max_alerts(),
            page_size: default_page_size(),
            utc_offset_minutes: 0,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_realtime_enabled(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from `crowdpulse.*` in the working directory and
    /// `CROWDPULSE__SECTION__KEY` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default file when given
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing, or if the merged
    /// configuration cannot be parsed or validated.
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        tracing::debug!(path = ?path, "Loading configuration");

        let file = path.map_or_else(
            || config::File::with_name("crowdpulse").required(false),
            |p| config::File::from(p).required(true),
        );

        let config: Self = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde defaults cannot guard
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first offending key.
    pub fn validate(&self) -> crate::Result<()> {
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(crate::Error::configuration(format!(
                "api.base_url must be an http(s) URL, got '{base}'"
            )));
        }

        let realtime = self.api.realtime_url.trim();
        if !(realtime.starts_with("ws://") || realtime.starts_with("wss://")) {
            return Err(crate::Error::configuration(format!(
                "api.realtime_url must be a ws(s) URL, got '{realtime}'"
            )));
        }

        if self.api.request_timeout == 0 {
            return Err(crate::Error::configuration(
                "api.request_timeout must be greater than zero",
            ));
        }
        if self.dashboard.refresh_interval == 0 {
            return Err(crate::Error::configuration(
                "dashboard.refresh_interval must be greater than zero",
            ));
        }
        if self.dashboard.page_size == 0 {
            return Err(crate::Error::configuration(
                "dashboard.page_size must be greater than zero",
            ));
        }
        if self.realtime.channel_capacity == 0 {
            return Err(crate::Error::configuration(
                "realtime.channel_capacity must be greater than zero",
            ));
        }
        if self.session.path.as_os_str().is_empty() {
            return Err(crate::Error::configuration("session.path must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    clippy::field_reassign_with_default
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "http://localhost:8080/api");
        assert_eq!(config.api.realtime_url, "ws://localhost:8080/ws");
        assert_eq!(config.api.request_timeout, 30);

        assert_eq!(
            config.session.path,
            PathBuf::from(".crowdpulse").join("session.json")
        );

        assert_eq!(config.dashboard.refresh_interval, 60);
        assert_eq!(config.dashboard.max_alerts, 50);
        assert_eq!(config.dashboard.page_size, 10);
        assert_eq!(config.dashboard.utc_offset_minutes, 0);

        assert!(config.realtime.enabled);
        assert_eq!(config.realtime.reconnect_delay_ms, 2000);
        assert_eq!(config.realtime.max_reconnect_attempts, 5);
        assert_eq!(config.realtime.channel_capacity, 256);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.logging.file.is_none());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_deserialization() {
        let json_str = r#"{
            "api": {"base_url": "https://analytics.example.com/api"},
            "dashboard": {"page_size": 25}
        }"#;

        let config: Config = serde_json::from_str(json_str).unwrap();

        assert_eq!(config.api.base_url, "https://analytics.example.com/api");
        assert_eq!(config.api.request_timeout, 30); // Uses default
        assert_eq!(config.dashboard.page_size, 25);
        assert_eq!(config.dashboard.max_alerts, 50); // Uses default
        assert!(config.realtime.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut config = Config::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(crate::Error::Configuration { .. })
        ));

        let mut config = Config::default();
        config.api.realtime_url = "http://example.com/ws".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api.realtime_url"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.dashboard.page_size = 0;
        assert!(config.validate().unwrap_err().to_string().contains("page_size"));

        let mut config = Config::default();
        config.dashboard.refresh_interval = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("refresh_interval"));

        let mut config = Config::default();
        config.realtime.channel_capacity = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("channel_capacity"));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://metrics.example.com/api"
realtime_url = "wss://metrics.example.com/ws"

[dashboard]
refresh_interval = 15
utc_offset_minutes = 330
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.api.base_url, "https://metrics.example.com/api");
        assert_eq!(config.api.realtime_url, "wss://metrics.example.com/ws");
        assert_eq!(config.dashboard.refresh_interval, 15);
        assert_eq!(config.dashboard.utc_offset_minutes, 330);
        assert_eq!(config.dashboard.page_size, 10);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Config::load_from(Some(&missing)).is_err());
    }

    #[test]
    fn test_config_serialization_roundtrip_keeps_overrides() {
        let mut config = Config::default();
        config.logging.file = Some(PathBuf::from("/var/log/crowdpulse.log"));
        config.realtime.enabled = false;

        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&serialized).unwrap();

        assert_eq!(
            deserialized.logging.file,
            Some(PathBuf::from("/var/log/crowdpulse.log"))
        );
        assert!(!deserialized.realtime.enabled);
    }
}
