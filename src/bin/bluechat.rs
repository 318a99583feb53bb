//! bluechat - point-to-point chat over an emulated radio link
//!
//! One side hosts, the other joins. Without a real Bluetooth stack the
//! radio is emulated over TCP, so two processes on one machine or LAN can
//! chat.
//!
//! # Usage
//!
//! ```text
//! bluechat host                       # advertise and wait for a peer
//! bluechat join                       # scan, then /connect N
//! bluechat join --peer 10.0.0.2:7878  # connect to this peer once scanning
//! bluechat peers                      # list configured and paired peers
//! bluechat --json host                # print events as JSON lines
//! ```

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bluechat_cli::{list_peers, run_chat, ChatOptions, ClientConfig};
use bluechat_core::{PeerIdentity, Role};
use bluechat_radio::tcp::TcpRadio;
use bluechat_radio::StaticPermissions;
use bluechat_session::spawn_session;

/// How long `bluechat peers` waits for discovery results.
const PEER_LIST_WINDOW: Duration = Duration::from_millis(500);

// ============================================================================
// CLI Arguments
// ============================================================================

/// bluechat - point-to-point chat between two devices
#[derive(Parser, Debug)]
#[command(name = "bluechat")]
#[command(about = "Chat with one nearby peer")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config dir>/bluechat/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Print every session event as a JSON line
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advertise the chat service and wait for a peer to join
    Host,
    /// Scan for hosts and connect to one
    Join {
        /// Connect to this address as soon as scanning starts
        #[arg(long, short = 'p')]
        peer: Option<String>,
    },
    /// List configured and paired peers
    Peers,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn get_log_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
        .map(|dir| dir.join("bluechat"))
}

fn create_log_file() -> Option<fs::File> {
    let log_dir = get_log_dir()?;

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("bluechat.log");

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

fn init_logging() {
    if let Some(file) = create_log_file() {
        let filter = EnvFilter::from_default_env().add_directive(
            "bluechat=info"
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
        );

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("off"))
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Resolves `--peer` against the configured peers so a known name is kept.
fn resolve_peer(config: &ClientConfig, address: &str) -> PeerIdentity {
    config
        .radio
        .peers
        .iter()
        .find(|peer| peer.address == address)
        .map(PeerIdentity::from)
        .unwrap_or_else(|| PeerIdentity::unnamed(address))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging();

    let config = ClientConfig::load(args.config.as_deref()).context("failed to load config")?;
    info!(
        local_name = %config.radio.local_name,
        listen_addr = %config.radio.listen_addr,
        peers = config.radio.peers.len(),
        "bluechat starting..."
    );

    let (role, peer) = match &args.command {
        Command::Peers => {
            let radio = TcpRadio::new(config.radio.clone());
            let mut stdout = io::stdout();
            list_peers(&radio, PEER_LIST_WINDOW, &mut stdout).await?;
            return Ok(());
        }
        Command::Host => (Role::Host, None),
        Command::Join { peer } => (Role::Join, peer.as_deref().map(|p| resolve_peer(&config, p))),
    };

    let radio = Arc::new(TcpRadio::new(config.radio.clone()));
    let session = spawn_session(radio, Arc::new(StaticPermissions::granted()), config.session);

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    let ctrl_c = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                ctrl_c_token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    let options = ChatOptions {
        role,
        peer,
        json: args.json,
    };
    let input = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();

    let result = run_chat(&session, options, input, &mut stdout, cancel_token.clone()).await;

    cancel_token.cancel();
    ctrl_c.abort();

    info!("bluechat stopped");

    result
}
