//! Client configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name announced at handshake
    pub client_name: String,
    /// Sync worker poll interval in milliseconds
    pub sync_interval_ms: u64,
    /// Fetch every node of a world when opening it
    pub prefetch_nodes: bool,
}

impl ClientConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With client name
    #[inline]
    #[must_use]
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// With sync poll interval
    ///
    /// Rounded up to whole milliseconds, so a nonzero interval never becomes zero.
    #[inline]
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_nanos().div_ceil(1_000_000);
        self.sync_interval_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    /// With prefetching on open
    #[inline]
    #[must_use]
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch_nodes = prefetch;
        self
    }

    /// Sync worker poll interval
    #[inline]
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` on an empty client name or a zero interval
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_name.trim().is_empty() {
            return Err(ConfigError::Invalid("client_name is empty".to_string()));
        }
        if self.sync_interval_ms == 0 {
            return Err(ConfigError::Invalid("sync_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed input
    /// - `ConfigError::Invalid` on out-of-range values
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`ClientConfig::from_toml_str`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "uwds client".to_string(),
            sync_interval_ms: 25,
            prefetch_nodes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.sync_interval(), Duration::from_millis(25));
        assert!(config.prefetch_nodes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str("client_name = \"viewer\"").unwrap();
        assert_eq!(config.client_name, "viewer");
        assert_eq!(config.sync_interval_ms, 25);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = ClientConfig::from_toml_str("sync_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = ClientConfig::from_toml_str("client_name = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "client_name = \"filter\"\nprefetch_nodes = false").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.client_name, "filter");
        assert!(!config.prefetch_nodes);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ClientConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn sub_millisecond_interval_rounds_up() {
        let config = ClientConfig::new().with_sync_interval(Duration::from_micros(500));
        assert_eq!(config.sync_interval(), Duration::from_millis(1));
        assert!(config.validate().is_ok());

        let config = ClientConfig::new().with_sync_interval(Duration::from_micros(2_001));
        assert_eq!(config.sync_interval_ms, 3);
    }

    #[test]
    fn builders() {
        let config = ClientConfig::new()
            .with_client_name("x")
            .with_sync_interval(Duration::from_millis(5))
            .with_prefetch(false);
        assert_eq!(config.client_name, "x");
        assert_eq!(config.sync_interval_ms, 5);
        assert!(!config.prefetch_nodes);
    }
}
