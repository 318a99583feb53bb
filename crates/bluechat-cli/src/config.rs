//! Client configuration file.
//!
//! ```toml
//! [session]
//! connect_timeout_ms = 5000
//!
//! [radio]
//! local_name = "desk"
//! listen_addr = "0.0.0.0:7878"
//!
//! [[radio.peers]]
//! address = "192.168.1.20:7878"
//! name = "laptop"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use bluechat_radio::tcp::TcpRadioConfig;
use bluechat_session::{ConfigError, SessionConfig};

use crate::error::Result;

/// Environment variable overriding `radio.listen_addr`.
pub const LISTEN_ENV: &str = "BLUECHAT_LISTEN";

/// Everything the client reads from its config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Session manager tunables
    pub session: SessionConfig,

    /// TCP-emulated radio settings
    pub radio: TcpRadioConfig,
}

impl ClientConfig {
    /// Default location: `<config dir>/bluechat/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bluechat").join("config.toml"))
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// read if present and built-in defaults are used otherwise. The
    /// environment override is applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::read(&default)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            config.apply_listen_override(addr);
        }
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::from)?;
        config.session.validate()?;
        Ok(config)
    }

    /// Replaces the listen address unless `addr` is blank.
    pub fn apply_listen_override(&mut self, addr: String) {
        if !addr.trim().is_empty() {
            self.radio.listen_addr = addr;
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_full_document() {
        let config = ClientConfig::from_toml_str(
            r#"
            [session]
            connect_timeout_ms = 5000

            [radio]
            local_name = "desk"
            listen_addr = "0.0.0.0:9000"

            [[radio.peers]]
            address = "10.0.0.2:9000"
            name = "laptop"

            [[radio.peers]]
            address = "10.0.0.3:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.connect_timeout_ms, 5000);
        assert_eq!(config.session.read_chunk_size, 1024);
        assert_eq!(config.radio.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.radio.peers.len(), 2);
        assert_eq!(config.radio.peers[0].name.as_deref(), Some("laptop"));
        assert!(config.radio.peers[1].name.is_none());
    }

    #[test]
    fn test_invalid_session_rejected() {
        let err = ClientConfig::from_toml_str("[session]\nread_chunk_size = 0\n").unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ClientConfig::load(Some(&missing)),
            Err(CliError::Config(ConfigError::Io { .. }))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[radio]\nlocal_name = \"bench\"").unwrap();

        let config = ClientConfig::read(file.path()).unwrap();
        assert_eq!(config.radio.local_name, "bench");
    }

    #[test]
    fn test_listen_override() {
        let mut config = ClientConfig::default();
        config.apply_listen_override("   ".to_string());
        assert_eq!(config.radio.listen_addr, "127.0.0.1:7878");

        config.apply_listen_override("0.0.0.0:1234".to_string());
        assert_eq!(config.radio.listen_addr, "0.0.0.0:1234");
    }
}
