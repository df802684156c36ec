//! keyhole-login - demo client
//!
//! Logs in with a challenge (default) or fetches credentials directly, then
//! prints the bundle as JSON.

use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tracing::info;

use keyhole::client::{fetch_credentials, login_with_challenge};
use keyhole::config::LogFormat;
use keyhole::identity::{Ed25519Signer, Signer};
use keyhole::logging;

#[derive(Parser, Debug)]
#[command(name = "keyhole-login")]
#[command(about = "Obtain service credentials from a keyhole server")]
struct Cli {
    /// Server base URL
    #[arg(long, env = "KEYHOLE_SERVER", default_value = "http://127.0.0.1:3001")]
    server: String,

    /// Hex-encoded 32-byte Ed25519 seed (random identity if omitted)
    #[arg(long, env = "KEYHOLE_SEED", hide_env_values = true)]
    seed: Option<String>,

    /// Skip the challenge and fetch credentials directly
    #[arg(long)]
    direct: bool,

    /// Overall timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

fn signer_from(seed: Option<&str>) -> anyhow::Result<Ed25519Signer> {
    let Some(seed) = seed else {
        return Ok(Ed25519Signer::generate());
    };
    let bytes = hex::decode(seed.trim()).context("seed is not valid hex")?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("seed must be 32 bytes, got {}", b.len()))?;
    Ok(Ed25519Signer::from_seed(&seed))
}

/// `http://host` → `ws://host/ws`, `https://host` → `wss://host/ws`
fn websocket_url(server: &str) -> String {
    let base = server.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws", base)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(&cli.log_level, LogFormat::Text);

    let bundle = if cli.direct {
        fetch_credentials(&cli.server)
            .await
            .context("direct credential fetch failed")?
    } else {
        let signer = signer_from(cli.seed.as_deref())?;
        info!(identifier = %signer.public_identifier(), "Logging in");
        login_with_challenge(
            &websocket_url(&cli.server),
            &signer,
            Duration::from_secs(cli.timeout_secs),
        )
        .await
        .context("challenge login failed")?
    };

    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}
