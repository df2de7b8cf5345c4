// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use crate::transport::Timeouts;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Lowest alias poll interval accepted (milliseconds).
pub const MIN_ALIAS_POLL_MS: u64 = 500;

/// Lowest status poll interval accepted (milliseconds).
pub const MIN_STATUS_POLL_MS: u64 = 200;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which request the status timer sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// `?`: routing table and health flags.
    #[default]
    Full,
    /// `Q`: health flags only.
    Quick,
}

/// Matrix client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Device label used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Device host name or IP address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Device TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Destination (matrix) address character.
    #[serde(default = "default_dest_address")]
    pub dest_address: char,

    /// Source (controller) address character.
    #[serde(default = "default_source_address")]
    pub source_address: char,

    /// Input count assumed until the device reports one.
    #[serde(default)]
    pub inputs: Option<usize>,

    /// Output count assumed until the device reports one.
    #[serde(default)]
    pub outputs: Option<usize>,

    /// Alias refresh interval (milliseconds).
    #[serde(default = "default_alias_poll_ms")]
    pub alias_poll_ms: u64,

    /// Status refresh interval (milliseconds).
    #[serde(default = "default_status_poll_ms")]
    pub status_poll_ms: u64,

    /// Request used by the status timer.
    #[serde(default)]
    pub status_mode: StatusMode,

    /// Quiet period that ends a reply (milliseconds).
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Upper bound on one exchange (milliseconds).
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,

    /// Drop replies whose checksum does not match.
    #[serde(default)]
    pub verify_checksum: bool,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "rf-matrix".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4001
}

fn default_dest_address() -> char {
    'A'
}

fn default_source_address() -> char {
    'B'
}

fn default_alias_poll_ms() -> u64 {
    10_000
}

fn default_status_poll_ms() -> u64 {
    1_000
}

fn default_idle_timeout_ms() -> u64 {
    200
}

fn default_overall_timeout_ms() -> u64 {
    1_500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            host: default_host(),
            port: default_port(),
            dest_address: default_dest_address(),
            source_address: default_source_address(),
            inputs: None,
            outputs: None,
            alias_poll_ms: default_alias_poll_ms(),
            status_poll_ms: default_status_poll_ms(),
            status_mode: StatusMode::Full,
            idle_timeout_ms: default_idle_timeout_ms(),
            overall_timeout_ms: default_overall_timeout_ms(),
            verify_checksum: false,
            log_level: default_log_level(),
        }
    }
}

impl MatrixConfig {
    /// Configuration for a device at `host:port` with all other defaults.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as TOML.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("serialize: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host is empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port cannot be 0".into()));
        }

        for (field, c) in [
            ("dest_address", self.dest_address),
            ("source_address", self.source_address),
        ] {
            if !c.is_ascii_graphic() || matches!(c, '{' | '}' | ',') {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a printable ASCII character other than '{{', '}}' or ',' (got {:?})",
                    field, c
                )));
            }
        }

        if self.inputs == Some(0) {
            return Err(ConfigError::Invalid("inputs cannot be 0".into()));
        }
        if self.outputs == Some(0) {
            return Err(ConfigError::Invalid("outputs cannot be 0".into()));
        }

        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("idle_timeout_ms cannot be 0".into()));
        }
        if self.overall_timeout_ms <= self.idle_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "overall_timeout_ms ({}) must exceed idle_timeout_ms ({})",
                self.overall_timeout_ms, self.idle_timeout_ms
            )));
        }

        Ok(())
    }

    /// Alias poll interval, raised to the minimum if configured lower.
    pub fn alias_interval(&self) -> Duration {
        clamp_interval("alias_poll_ms", self.alias_poll_ms, MIN_ALIAS_POLL_MS)
    }

    /// Status poll interval, raised to the minimum if configured lower.
    pub fn status_interval(&self) -> Duration {
        clamp_interval("status_poll_ms", self.status_poll_ms, MIN_STATUS_POLL_MS)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            idle: Duration::from_millis(self.idle_timeout_ms),
            overall: Duration::from_millis(self.overall_timeout_ms),
        }
    }
}

fn clamp_interval(field: &str, ms: u64, min: u64) -> Duration {
    if ms < min {
        tracing::warn!("{} = {} is below the minimum, using {}", field, ms, min);
    }
    Duration::from_millis(ms.max(min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatrixConfig::default();
        assert_eq!(config.dest_address, 'A');
        assert_eq!(config.source_address, 'B');
        assert_eq!(config.status_mode, StatusMode::Full);
        assert!(!config.verify_checksum);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_clamping() {
        let config = MatrixConfig {
            alias_poll_ms: 100,
            status_poll_ms: 50,
            ..Default::default()
        };
        assert_eq!(config.alias_interval(), Duration::from_millis(500));
        assert_eq!(config.status_interval(), Duration::from_millis(200));

        let config = MatrixConfig {
            alias_poll_ms: 5000,
            status_poll_ms: 750,
            ..Default::default()
        };
        assert_eq!(config.alias_interval(), Duration::from_millis(5000));
        assert_eq!(config.status_interval(), Duration::from_millis(750));
    }

    #[test]
    fn test_validation() {
        let mut config = MatrixConfig::new("", 4001);
        assert!(config.validate().is_err());

        config.host = "10.0.0.5".into();
        config.port = 0;
        assert!(config.validate().is_err());

        config.port = 4001;
        config.dest_address = '{';
        assert!(config.validate().is_err());

        config.dest_address = 'A';
        config.outputs = Some(0);
        assert!(config.validate().is_err());

        config.outputs = Some(16);
        config.overall_timeout_ms = 100;
        assert!(config.validate().is_err());

        config.overall_timeout_ms = 1500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MatrixConfig = toml::from_str(
            r#"
            host = "192.168.1.50"
            port = 5000
            outputs = 16
            status_mode = "quick"
            "#,
        )
        .expect("parse");
        assert_eq!(config.host, "192.168.1.50");
        assert_eq!(config.outputs, Some(16));
        assert_eq!(config.inputs, None);
        assert_eq!(config.status_mode, StatusMode::Quick);
        assert_eq!(config.alias_poll_ms, 10_000);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("matrix.toml");

        let config = MatrixConfig {
            inputs: Some(32),
            outputs: Some(16),
            ..MatrixConfig::new("10.1.2.3", 4100)
        };
        config.to_file(&path).expect("write");

        let loaded = MatrixConfig::from_file(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "port = 0\n").expect("write");
        assert!(matches!(
            MatrixConfig::from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
