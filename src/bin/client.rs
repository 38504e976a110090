//! Shadow Tunnel Client
//!
//! Runs a local SOCKS5 proxy. Each accepted connection is negotiated,
//! wrapped in an encrypted shadow stream to the remote server, and relayed
//! until both directions close.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use shadow_tunnel::{config::Config, proxy::socks5, relay, shadow::ShadowStream};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Shadow Tunnel Client - local SOCKS5 front-end
#[derive(Parser, Debug)]
#[command(name = "shadow-client")]
#[command(about = "Shadow tunnel client - local SOCKS5 front-end")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Remote server address (host:port, overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Local SOCKS5 listen address
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
            .client
            .ok_or_else(|| anyhow!("No [client] section in config file"))?,
        None => Default::default(),
    };

    let server = args.server.unwrap_or(file_config.server);
    let listen = args.listen.unwrap_or(file_config.local_listen);
    let password = args.password.unwrap_or(file_config.password);

    if server.is_empty() {
        return Err(anyhow!("Remote server address is required (--server)"));
    }
    if password.is_empty() {
        return Err(anyhow!("Password is required (--password)"));
    }

    info!("Shadow tunnel client v{}", shadow_tunnel::VERSION);
    info!("Remote server: {}", server);

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!("SOCKS5 proxy listening on {}", listen);

    let server = Arc::new(server);
    let password = Arc::new(password);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Accept error: {}", e);
                continue;
            }
        };
        debug!("SOCKS5 connection from {}", peer);

        let server = Arc::clone(&server);
        let password = Arc::clone(&password);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &server, password.as_bytes()).await {
                debug!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

/// Negotiate with the SOCKS5 client, open the tunnel, and relay
async fn handle_connection(mut client: TcpStream, server: &str, password: &[u8]) -> Result<()> {
    let addr = socks5::handshake(&mut client).await?;

    let remote = TcpStream::connect(server)
        .await
        .context("Failed to connect to server")?;
    remote.set_nodelay(true)?;

    let mut tunnel = ShadowStream::new(remote, password);

    // The target address is the first payload on the encrypted stream.
    tunnel.write(&addr.to_bytes()).await?;

    let (sent, received) = relay::relay(tunnel, client).await?;
    debug!("Closed {}: {} bytes out, {} bytes in", addr, sent, received);

    Ok(())
}
