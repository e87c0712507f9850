use anyhow::{Context, Result, bail};
use keyward_observer::HubConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Loopback address the daemon listens on unless configured otherwise.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7781";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DaemonConfig {
    pub listen: SocketAddr,
    pub hub: HubConfig,
}

impl DaemonConfig {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing default file means defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        if !config_path.exists() {
            if explicit {
                bail!("config file {} does not exist", config_path.display());
            }
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid config {}", config_path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn config_path() -> PathBuf {
        dirs_path().join("daemon.toml")
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 7781)),
            hub: HubConfig::default(),
        }
    }
}

fn dirs_path() -> PathBuf {
    if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(config_dir).join("keyward")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("keyward")
    } else {
        PathBuf::from("/tmp/keyward")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(config.hub.inbound_capacity, 256);
        assert_eq!(config.hub.subscriber_capacity, 64);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = DaemonConfig::parse(
            r#"
            listen = "127.0.0.1:9000"

            [hub]
            subscriber_capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.hub.subscriber_capacity, 8);
        assert_eq!(config.hub.inbound_capacity, 256);
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        assert!(DaemonConfig::parse(r#"listen = "not an address""#).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        std::fs::write(&path, "[hub]\ninbound_capacity = 4\n").unwrap();
        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(config.hub.inbound_capacity, 4);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DaemonConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
