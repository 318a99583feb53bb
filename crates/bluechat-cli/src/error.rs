//! Error types for the bluechat client.
//!
//! Input errors are reported inline and the chat keeps running; config
//! errors abort start-up.

use std::io;

use thiserror::Error;

use bluechat_session::ConfigError;

// ============================================================================
// Client Error Type
// ============================================================================

/// Client errors.
#[derive(Error, Debug)]
pub enum CliError {
    /// A line started with `/` but named no known command.
    #[error("unknown command: /{0} (try /help)")]
    UnknownCommand(String),

    /// A command was given without its argument.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    /// `/connect` was given something other than a positive number.
    #[error("invalid peer number: {0}")]
    InvalidPeerNumber(String),

    /// `/connect N` named a position past the end of the list.
    #[error("no peer #{0}, type /peers to list them")]
    NoSuchPeer(usize),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Terminal I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_display() {
        let error = CliError::UnknownCommand("dance".to_string());
        assert_eq!(error.to_string(), "unknown command: /dance (try /help)");
    }

    #[test]
    fn test_no_such_peer_display() {
        let display = CliError::NoSuchPeer(4).to_string();
        assert!(display.contains("#4"));
        assert!(display.contains("/peers"));
    }

    #[test]
    fn test_config_error_is_transparent() {
        let error: CliError = ConfigError::Invalid("read_chunk_size must be greater than zero".into()).into();
        assert_eq!(
            error.to_string(),
            "invalid config: read_chunk_size must be greater than zero"
        );
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_error = io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed");
        let error: CliError = io_error.into();
        assert!(matches!(error, CliError::Io(_)));
    }
}
