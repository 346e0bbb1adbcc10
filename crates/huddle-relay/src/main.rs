//! huddle-relay: WebSocket signaling relay for small mesh rooms.
//!
//! Accepts WebSocket connections on `/<room-code>`, keeps a roster per
//! room, and forwards negotiation messages between members. The relay never
//! carries media and never inspects session descriptions.

mod connection;
mod names;
mod room;

use std::path::PathBuf;

use clap::Parser;
use huddle_config::HuddleConfig;
use tokio::net::TcpListener;

use crate::room::RoomStore;

#[derive(Parser)]
#[command(name = "huddle-relay", about = "Signaling relay for huddle rooms")]
struct Args {
    /// Address to bind (overrides `[relay] host`).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides `[relay] port`).
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file to read instead of the platform default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn load_config(args: &Args) -> Result<HuddleConfig, huddle_common::ConfigError> {
    match &args.config {
        Some(path) => huddle_config::load_from_path(path),
        None => huddle_config::load_config(),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let loaded = load_config(&args);
    let directive = loaded
        .as_ref()
        .map(|c| c.logging.directive("huddle_relay"))
        .unwrap_or_else(|_| "huddle_relay=info".into());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| directive.into()),
        )
        .init();

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Config unavailable, using defaults");
            HuddleConfig::default()
        }
    };

    if let Some(host) = args.host {
        config.relay.host = host;
    }
    if let Some(port) = args.port {
        config.relay.port = port;
    }

    if args.print_config {
        println!("{}", huddle_config::config_to_json(&config));
        return;
    }

    let store = RoomStore::new(config.relay.max_name_len as usize);
    let addr = format!("{}:{}", config.relay.host, config.relay.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    tracing::info!("huddle-relay listening on {}", addr);

    // Accept loop.
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let store = store.clone();
                tokio::spawn(connection::accept(stream, peer, store));
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
