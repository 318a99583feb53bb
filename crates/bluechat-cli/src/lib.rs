//! bluechat client - library modules
//!
//! This library provides the pieces of the line-based chat client:
//!
//! 1. **Chat loop** (`chat`): drives a session from input lines and prints
//!    session events
//! 2. **Render model** (`app`): folds events into what the user sees
//! 3. **Input** (`input`): parses `/commands` and chat text
//! 4. **Config** (`config`): the client config file
//!
//! The loop respects a `CancellationToken` for Ctrl+C shutdown.

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod input;

// Re-export commonly used types
pub use app::ChatView;
pub use chat::{list_peers, run_chat, ChatOptions};
pub use config::ClientConfig;
pub use error::{CliError, Result};
