//! wssh relay daemon
//!
//! Serves one SSH target to browser terminals over WebSocket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wssh_core::config::{self, HostKeyPolicy, WsshConfig};
use wssh_core::{ConfigError, RemoteSession};
use wssh_server::{RelayServer, SessionFactory};

#[derive(Parser)]
#[command(name = "wssh")]
#[command(about = "Relay a remote SSH shell to browser terminals over WebSocket")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SSH user [default: root]
    #[arg(short, long)]
    user: Option<String>,

    /// SSH host [default: localhost]
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// SSH port [default: 22]
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Private key file; takes precedence over the password
    #[arg(short, long)]
    identity: Option<PathBuf>,

    /// SSH password (also used as key passphrase if none is given)
    #[arg(short, long, env = "WSSH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Passphrase for the private key
    #[arg(long, env = "WSSH_KEY_PASSPHRASE", hide_env_values = true)]
    key_passphrase: Option<String>,

    /// Port to serve WebSocket connections on [default: 8022]
    #[arg(short = 'l', long)]
    listen_port: Option<u16>,

    /// Require this SSH host key fingerprint (SHA256:...)
    #[arg(long)]
    host_key_fingerprint: Option<String>,

    /// SSH connect timeout in seconds [default: 10]
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// WebSocket route [default: /ssh]
    #[arg(long)]
    path: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Start serving without checking the SSH target first
    #[arg(long)]
    skip_preflight: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args)?;
    config.validate().context("Invalid configuration")?;

    let factory = SessionFactory::new(config.ssh.clone())?;
    let target = format!("{}@{}", config.ssh.user, config.ssh.address());

    if args.skip_preflight {
        tracing::info!("Skipping SSH preflight check");
    } else {
        tracing::info!("Checking SSH access to {}", target);
        let session = factory
            .open_session()
            .await
            .with_context(|| format!("Cannot open an SSH session to {}", target))?;
        session.close().await;
        tracing::info!("SSH target {} is usable", target);
    }

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        cancel_clone.cancel();
    });

    let server = RelayServer::new(config.server.clone(), Arc::new(factory), cancel);
    server.run().await?;

    tracing::info!("wssh shutdown complete");
    Ok(())
}

/// Load the config file (if any) and apply command line overrides
fn load_config(args: &Args) -> Result<WsshConfig> {
    let mut config: WsshConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        match config::load_config::<WsshConfig>(&default_path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => {
                tracing::debug!("No config file at {:?}, using defaults", default_path);
                WsshConfig::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to load config from {:?}", default_path))
            }
        }
    };

    let ssh = &mut config.ssh;
    if let Some(user) = &args.user {
        ssh.user = user.clone();
    }
    if let Some(host) = &args.host {
        ssh.host = host.clone();
    }
    if let Some(port) = args.port {
        ssh.port = port;
    }
    if let Some(identity) = &args.identity {
        ssh.identity_file = Some(identity.clone());
    }
    if let Some(password) = &args.password {
        ssh.password = Some(password.clone());
    }
    if let Some(passphrase) = &args.key_passphrase {
        ssh.key_passphrase = Some(passphrase.clone());
    }
    if let Some(fingerprint) = &args.host_key_fingerprint {
        ssh.host_key = HostKeyPolicy::Fingerprint {
            fingerprint: fingerprint.clone(),
        };
    }
    if let Some(secs) = args.connect_timeout {
        ssh.connect_timeout = Duration::from_secs(secs);
    }

    let server = &mut config.server;
    if let Some(port) = args.listen_port {
        server.listen_address = with_port(&server.listen_address, port);
    }
    if let Some(path) = &args.path {
        server.path = path.clone();
    }

    Ok(config)
}

/// Replace the port of a `host:port` listen address
fn with_port(address: &str, port: u16) -> String {
    match address.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", address, port),
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
