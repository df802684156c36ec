//! keyhole server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use keyhole::{config::Args, logging, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  keyhole - challenge-response login");
    info!("======================================");
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_COMMIT_SHORT"));
    info!("Built: {}", env!("BUILD_TIMESTAMP"));
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!(
        "Authorizations: {}",
        args.upstream_auth_url
            .as_deref()
            .unwrap_or("signed locally")
    );
    info!("Handshake timeout: {}s", args.handshake_timeout_secs);
    info!("Max connections: {}", args.max_connections);
    info!("Direct credentials: {}", args.direct_credentials);
    info!("======================================");

    let state = Arc::new(AppState::new(args)?);
    server::run(state).await?;

    Ok(())
}
