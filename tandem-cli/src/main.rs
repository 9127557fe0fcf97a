//! Tandem CLI
//!
//! Runs a channel node: generates keys, listens for peers, dials peers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tandem_channel::{ChannelConfig, ChannelManager, Instance};
use tandem_contacts::ContactBook;
use tandem_core::types::{OffChainId, TransportKind};
use tandem_crypto::{EcdsaVerifier, Keypair, SessionIdChecker};

/// Tandem - bilateral payment channel node
#[derive(Parser)]
#[command(name = "tandem")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new secp256k1 key
    Keygen {
        /// Output file for the key (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Accept channels from peers until Ctrl+C
    Listen {
        /// Contact file holding this node's own entry
        #[arg(short, long, env = "TANDEM_CONTACTS")]
        contacts: PathBuf,
        /// Alias of this node in the contact file
        #[arg(short, long)]
        alias: String,
        /// Verified channels queued before the caller picks them up
        #[arg(long)]
        max_pending: Option<usize>,
    },

    /// Open a channel to a peer and close it again
    Connect {
        /// Contact file holding both entries
        #[arg(short, long, env = "TANDEM_CONTACTS")]
        contacts: PathBuf,
        /// Alias of this node in the contact file
        #[arg(short, long)]
        alias: String,
        /// Alias of the peer to dial
        #[arg(short, long)]
        peer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tandem=debug,info"
    } else {
        "tandem=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Keygen { output } => cmd_keygen(output.as_deref()),
        Commands::Listen {
            contacts,
            alias,
            max_pending,
        } => cmd_listen(&contacts, &alias, max_pending).await,
        Commands::Connect {
            contacts,
            alias,
            peer,
        } => cmd_connect(&contacts, &alias, &peer).await,
    }
}

fn manager() -> Result<ChannelManager> {
    let config = ChannelConfig::from_env().context("invalid channel configuration")?;
    let manager = ChannelManager::new(
        config,
        Arc::new(EcdsaVerifier),
        Arc::new(SessionIdChecker),
    )?;
    Ok(manager)
}

async fn lookup(book_path: &Path, aliases: &[&str]) -> Result<Vec<OffChainId>> {
    let book = ContactBook::load(book_path)
        .await
        .with_context(|| format!("loading contacts from {}", book_path.display()))?;

    aliases
        .iter()
        .map(|alias| {
            book.off_chain_id(alias)
                .ok_or_else(|| anyhow!("no contact named '{}' in {}", alias, book_path.display()))
        })
        .collect()
}

/// Generate a new key
fn cmd_keygen(output: Option<&Path>) -> Result<()> {
    println!("{}", "🔑 Generating channel key...".cyan().bold());

    let keypair = Keypair::generate();
    let secret = keypair.secret_hex();
    let key_json = serde_json::json!({
        "address": keypair.address().to_hex_string(),
        "secret": secret.as_str(),
    });

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&key_json)?)?;
        println!("{} {}", "✅ Key saved to:".green(), path.display());
    } else {
        println!("\n{}", "Key (JSON):".yellow().bold());
        println!("{}", serde_json::to_string_pretty(&key_json)?);
    }

    println!("   {} {}", "Address:".dimmed(), keypair.address());
    println!("\n{}", "⚠️  IMPORTANT: Keep your secret key safe!".red().bold());
    Ok(())
}

/// Run a session and log every verified peer
async fn cmd_listen(contacts: &Path, alias: &str, max_pending: Option<usize>) -> Result<()> {
    let ids = lookup(contacts, &[alias]).await?;
    let self_id = &ids[0];
    let manager = manager()?;
    let max_pending = max_pending.unwrap_or(manager.config().max_pending_conns);

    println!("{} {}", "🚀 Starting session as".cyan().bold(), self_id);
    let mut session = manager
        .new_session(self_id, TransportKind::WebSocket, max_pending)
        .await
        .context("starting session")?;

    if let Some(addr) = session.local_addr() {
        println!("   {} ws://{}{}", "Listening on:".green(), addr, self_id.listener_endpoint);
    }
    println!("\n   Press Ctrl+C to stop.\n");

    loop {
        tokio::select! {
            channel = session.next_channel() => match channel {
                Some(channel) => {
                    info!(
                        peer = ?channel.peer_id().map(|p| p.to_string()),
                        role = %channel.role_channel(),
                        "channel established"
                    );
                    tokio::spawn(drain(channel));
                }
                None => {
                    warn!("listener stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Shutting down...".yellow());
                break;
            }
        }
    }

    session.close().await;
    Ok(())
}

/// Logs messages from a peer until it hangs up.
async fn drain(mut channel: Instance) {
    loop {
        match channel.read().await {
            Ok(message) => info!(message_id = message.body.id(), "message received"),
            Err(e) => {
                info!(error = %e, "channel ended");
                break;
            }
        }
    }
    if let Err(e) = channel.close().await {
        warn!(error = %e, "error closing channel");
    }
}

/// Dial a peer, show the negotiated roles, close
async fn cmd_connect(contacts: &Path, alias: &str, peer: &str) -> Result<()> {
    let ids = lookup(contacts, &[alias, peer]).await?;
    let (self_id, peer_id) = (&ids[0], &ids[1]);
    let manager = manager()?;

    println!("{} {}", "🔗 Connecting to".cyan().bold(), peer_id);
    let mut channel = manager
        .new_channel(self_id, peer_id, TransportKind::WebSocket)
        .await
        .with_context(|| format!("opening channel to {}", peer))?;

    println!("\n{}", "✅ Channel established:".green().bold());
    println!("   {} {}", "Role:".dimmed(), channel.role_channel());
    if let Some(sender) = channel.sender_id() {
        println!("   {} {}", "Sender:".dimmed(), sender);
    }
    if let Some(receiver) = channel.receiver_id() {
        println!("   {} {}", "Receiver:".dimmed(), receiver);
    }

    channel.close().await?;
    Ok(())
}
