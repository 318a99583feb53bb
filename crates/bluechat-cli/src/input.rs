//! Line input handling.
//!
//! Plain lines are chat text. Lines starting with `/` are commands:
//!
//! | Command      | Action                                   |
//! |--------------|------------------------------------------|
//! | `/quit`      | Close the session and exit               |
//! | `/peers`     | List peers found by the current scan     |
//! | `/connect N` | Connect to the N-th listed peer          |
//! | `/help`      | Show the command list                    |

use crate::error::{CliError, Result};

/// What a line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do (blank line).
    None,

    /// Send this text to the peer.
    Send(String),

    /// Close the session and exit.
    Quit,

    /// Print the peer list.
    ListPeers,

    /// Connect to the peer at this zero-based position.
    Connect(usize),

    /// Print the command list.
    Help,
}

/// Text printed for `/help`.
pub const HELP: &str = "\
commands:
  /peers       list peers found while scanning
  /connect N   connect to peer N from the list
  /quit        close the session and exit
anything else is sent to the peer";

/// Parses one line of user input.
///
/// Trailing newlines are ignored; other whitespace in chat text is kept.
pub fn parse_line(line: &str) -> Result<Action> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.trim().is_empty() {
        return Ok(Action::None);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Action::Send(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();

    match name {
        "quit" | "q" | "exit" => Ok(Action::Quit),
        "peers" | "ls" => Ok(Action::ListPeers),
        "help" | "h" | "?" => Ok(Action::Help),
        "connect" | "c" => {
            let arg = parts.next().ok_or(CliError::MissingArgument("/connect N"))?;
            match arg.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(Action::Connect(n - 1)),
                _ => Err(CliError::InvalidPeerNumber(arg.to_string())),
            }
        }
        other => Err(CliError::UnknownCommand(other.to_string())),
    }
}
