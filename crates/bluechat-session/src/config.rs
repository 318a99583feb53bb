//! Session manager configuration.
//!
//! Loaded from a TOML table; every field is optional and falls back to the
//! defaults below.
//!
//! ```toml
//! service_name = "BTChat"
//! service_id = "00001101-0000-1000-8000-00805f9b34fb"
//! read_chunk_size = 1024
//! discoverable_secs = 300
//! connect_timeout_ms = 10000
//! event_buffer = 256
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use bluechat_core::{ServiceRecord, DEFAULT_SERVICE_NAME, SERIAL_PORT_SERVICE_ID};

/// Default number of bytes requested per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default discoverability window for the host role.
pub const DEFAULT_DISCOVERABLE_SECS: u64 = 300;

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this structure.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name the host registers its service under
    pub service_name: String,

    /// Service identifier shared by host and joiner
    pub service_id: Uuid,

    /// Maximum bytes per read; each read becomes one message
    pub read_chunk_size: usize,

    /// How long the host stays discoverable
    pub discoverable_secs: u64,

    /// Bound on the join side's connect attempt
    pub connect_timeout_ms: u64,

    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_id: SERIAL_PORT_SERVICE_ID,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            discoverable_secs: DEFAULT_DISCOVERABLE_SECS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SessionConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the session manager cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "read_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "event_buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The service record both roles use.
    pub fn service(&self) -> ServiceRecord {
        ServiceRecord::new(self.service_name.clone(), self.service_id)
    }

    pub fn discoverable_duration(&self) -> Duration {
        Duration::from_secs(self.discoverable_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
