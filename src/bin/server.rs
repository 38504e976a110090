//! Shadow Tunnel Server
//!
//! Accepts encrypted shadow streams, reads the target address from the
//! first decrypted payload, connects to the destination, and relays until
//! both directions close.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use shadow_tunnel::{config::Config, proxy::Address, relay, shadow::ShadowStream};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Shadow Tunnel Server - remote tunnel endpoint
#[derive(Parser, Debug)]
#[command(name = "shadow-server")]
#[command(about = "Shadow tunnel server - remote tunnel endpoint")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Tunnel password
    #[arg(short = 'k', long)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    // Load configuration, CLI flags take precedence
    let file_config = match &args.config {
        Some(path) => Config::load(path)
            .context("Failed to load configuration")?
            .server
            .ok_or_else(|| anyhow!("No [server] section in config file"))?,
        None => Default::default(),
    };

    let listen = args.listen.unwrap_or(file_config.listen);
    let password = args.password.unwrap_or(file_config.password);

    if password.is_empty() {
        return Err(anyhow!("Password is required (--password)"));
    }

    info!("Shadow tunnel server v{}", shadow_tunnel::VERSION);

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!("Listening on {}", listen);

    let password = Arc::new(password);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Accept error: {}", e);
                continue;
            }
        };
        debug!("Tunnel connection from {}", peer);

        let password = Arc::clone(&password);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, password.as_bytes()).await {
                debug!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

/// Decrypt the tunnel, resolve the target from the first payload, and relay
async fn handle_connection(stream: TcpStream, password: &[u8]) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut tunnel = ShadowStream::new(stream, password);

    // The first payload is exactly one address record.
    let mut buf = [0u8; shadow_tunnel::proxy::MAX_ADDRESS_LEN];
    let n = tunnel.read(&mut buf).await?;
    let addr = Address::from_bytes(&buf[..n])?;
    debug!("Relaying to {}", addr);

    let target = TcpStream::connect(addr.to_string())
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    target.set_nodelay(true)?;

    let (to_client, to_target) = relay::relay(tunnel, target).await?;
    debug!(
        "Closed {}: {} bytes to target, {} bytes to client",
        addr, to_target, to_client
    );

    Ok(())
}
