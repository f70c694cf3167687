//! Peer configuration.

use crate::{ConfigError, Result};
use peerdex_core::PeerId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bytes written per chunk when serving a file.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024;

/// Default period between liveness pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Parent directory of per-peer repositories.
pub const DEFAULT_REPOSITORY_ROOT: &str = "./repository";

/// Configuration for one peer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Name announced in HELLO; with the listen port it forms the identity.
    pub name: String,
    /// Data-plane listen address. Port 0 picks a free port.
    pub listen_addr: SocketAddr,
    /// Directory control-plane address, `host:port`.
    pub directory: String,
    /// Local repository. Defaults to `./repository/<name>`.
    pub repository: Option<PathBuf>,
    /// Period between liveness pings.
    #[serde(with = "seconds")]
    pub ping_interval: Duration,
    /// Maximum bytes per write when serving a file.
    pub chunk_size: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: "peer".to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            directory: "127.0.0.1:5000".to_string(),
            repository: None,
            ping_interval: DEFAULT_PING_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PeerConfig {
    /// Creates a configuration with defaults for everything but the name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the repository path, applying the default.
    #[must_use]
    pub fn repository_path(&self) -> PathBuf {
        self.repository
            .clone()
            .unwrap_or_else(|| Path::new(DEFAULT_REPOSITORY_ROOT).join(&self.name))
    }

    /// Builds this peer's identity for the given listening port.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid identity host.
    pub fn identity(&self, port: u16) -> Result<PeerId> {
        Ok(PeerId::new(self.name.clone(), port)?)
    }

    /// Checks names and limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Err(e) = PeerId::new(self.name.clone(), 0) {
            return Err(ConfigError::Invalid(format!("name: {e}")));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.ping_interval.is_zero() {
            return Err(ConfigError::Invalid("ping_interval must be positive".into()));
        }
        if self.directory.trim().is_empty() {
            return Err(ConfigError::Invalid("directory address is empty".into()));
        }
        Ok(())
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = PeerConfig::new("alice");
        config.validate().unwrap();
        assert_eq!(config.chunk_size, 10240);
        assert_eq!(config.repository_path(), PathBuf::from("./repository/alice"));
        assert_eq!(config.identity(5001).unwrap().to_string(), "alice:5001");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(PeerConfig::new("bad name").validate().is_err());
        assert!(PeerConfig::new("").validate().is_err());

        let config = PeerConfig {
            chunk_size: 0,
            ..PeerConfig::new("alice")
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reports_typed_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            PeerConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "chunk_size: [not a number]\n").unwrap();
        assert!(matches!(
            PeerConfig::load(&broken),
            Err(ConfigError::Parse(_))
        ));

        let invalid = dir.path().join("invalid.yaml");
        std::fs::write(&invalid, "name: alice\nping_interval: 0\n").unwrap();
        assert!(matches!(
            PeerConfig::load(&invalid),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn yaml_fills_defaults() {
        let config: PeerConfig =
            serde_yaml::from_str("name: bob\nping_interval: 2.5\nrepository: /tmp/bob\n").unwrap();
        assert_eq!(config.name, "bob");
        assert_eq!(config.ping_interval, Duration::from_millis(2500));
        assert_eq!(config.repository_path(), PathBuf::from("/tmp/bob"));
        assert_eq!(config.directory, "127.0.0.1:5000");
    }
}
