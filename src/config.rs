use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default path of the configuration file
pub const CONFIG_FILE: &str = "config.json5";

/// LAN address the router answers on out of the box
pub const DEFAULT_HOST: &str = "192.168.1.1";

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

pub const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Application configuration structure
///
/// Contains all configuration parameters for the CPE monitor. Every field is
/// optional in the file and falls back to its documented default.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Host name or IP address of the router management interface
    #[serde(default = "default_host")]
    pub host: String,
    /// Seconds between the start of two polling cycles
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Connect and read timeout applied to every device request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// HTTP status the device must answer with for a response to be accepted
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Port the host adapter HTTP server listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_expected_status() -> u16 {
    DEFAULT_EXPECTED_STATUS
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            scan_interval_secs: default_scan_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            expected_status: default_expected_status(),
            listen_port: default_listen_port(),
        }
    }
}

impl Config {
    /// Load the application configuration from the given JSON5 file.
    ///
    /// A missing file is not an error: the defaults are used so the monitor
    /// can start against the router's factory address.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration fails [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading application configuration from {}", path.display());

        if !path.exists() {
            tracing::info!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)?;
        let config = Self::from_json5(&config_str)?;

        tracing::info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate a configuration from a JSON5 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON5 or fails validation.
    pub fn from_json5(text: &str) -> Result<Self> {
        let config: Config = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MonitorError::from("Host cannot be empty"));
        }

        let host = self.host.trim();
        let candidate = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{host}/")
        };
        if Url::parse(&candidate).is_err() {
            return Err(MonitorError::from(format!(
                "Invalid host: {}",
                self.host
            )));
        }

        if self.scan_interval_secs == 0 {
            return Err(MonitorError::from("Scan interval must be at least one second"));
        }

        if self.request_timeout_secs == 0 {
            return Err(MonitorError::from(
                "Request timeout must be at least one second",
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = Config::from_json5("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.scan_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = Config::from_json5("{ host: '10.0.0.1', scan_interval_secs: 15 }").unwrap();
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.scan_interval_secs, 15);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.expected_status, 200);
    }

    #[test]
    fn test_empty_host_rejected() {
        let err = Config::from_json5("{ host: '  ' }").unwrap_err();
        assert_eq!(
            err.to_string(),
            MonitorError::from("Host cannot be empty").to_string()
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Config::from_json5("{ scan_interval_secs: 0 }").is_err());
        assert!(Config::from_json5("{ request_timeout_secs: 0 }").is_err());
    }

    #[test]
    fn test_host_with_port_accepted() {
        let config = Config::from_json5("{ host: '127.0.0.1:8080' }").unwrap();
        assert_eq!(config.host, "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_json5_is_parse_error() {
        let err = Config::from_json5("{ host: ").unwrap_err();
        assert!(matches!(err, MonitorError::ConfigParse(_)));
    }
}
