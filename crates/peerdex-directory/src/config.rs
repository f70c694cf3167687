//! Directory configuration.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default control-plane address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";

/// Default time after which a silent peer is expired.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(300);

/// Default period of the expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a [`DirectoryServer`](crate::DirectoryServer).
///
/// Durations are written in seconds and may be fractional:
///
/// ```yaml
/// listen_addr: 0.0.0.0:5000
/// peer_timeout: 300
/// sweep_interval: 60
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Address the control plane listens on.
    pub listen_addr: SocketAddr,
    /// Peers silent for longer than this are removed.
    #[serde(with = "seconds")]
    pub peer_timeout: Duration,
    /// How often the sweep runs. Must be shorter than `peer_timeout`.
    #[serde(with = "seconds")]
    pub sweep_interval: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl DirectoryConfig {
    /// Loads a configuration from a YAML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// result does not validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the effective configuration: the file at `path` (or the
    /// defaults), then `overrides`, then validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// combined result does not validate.
    pub fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };
        let config = config.with_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Replaces every field that has an override.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(listen) = overrides.listen_addr {
            self.listen_addr = listen;
        }
        if let Some(timeout) = overrides.peer_timeout {
            self.peer_timeout = timeout;
        }
        if let Some(interval) = overrides.sweep_interval {
            self.sweep_interval = interval;
        }
        self
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Checks the timing constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an interval is zero or the sweep
    /// interval is not strictly shorter than the peer timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peer_timeout.is_zero() {
            return Err(ConfigError::Invalid("peer_timeout must be positive".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "sweep_interval must be positive".into(),
            ));
        }
        if self.sweep_interval >= self.peer_timeout {
            return Err(ConfigError::Invalid(format!(
                "sweep_interval ({:?}) must be shorter than peer_timeout ({:?})",
                self.sweep_interval, self.peer_timeout
            )));
        }
        Ok(())
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replaces `listen_addr`.
    pub listen_addr: Option<SocketAddr>,
    /// Replaces `peer_timeout`.
    pub peer_timeout: Option<Duration>,
    /// Replaces `sweep_interval`.
    pub sweep_interval: Option<Duration>,
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
