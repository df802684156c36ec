//! Configuration for keyhole
//!
//! CLI arguments with environment variable fallbacks. Secrets are read once
//! at startup and never change afterwards.

use clap::{ArgAction, Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::credentials::token::MIN_SECRET_LEN;

const DEV_API_KEY: &str = "dev-service-key";
const DEV_API_SECRET: &str = "dev-service-secret";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// keyhole - challenge-response key login
#[derive(Parser, Debug, Clone)]
#[command(name = "keyhole")]
#[command(about = "Proves possession of a signing key and issues service credentials")]
pub struct Args {
    /// Unique node identifier for this instance (used as token issuer)
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3001")]
    pub listen: SocketAddr,

    /// Public key of the downstream service account, handed to clients
    #[arg(long, env = "USER_API_KEY")]
    pub user_api_key: Option<String>,

    /// Secret matching USER_API_KEY, used to sign authorizations locally
    #[arg(long, env = "USER_API_SECRET", hide_env_values = true)]
    pub user_api_secret: Option<String>,

    /// Fetch authorizations from this endpoint instead of signing locally
    #[arg(long, env = "UPSTREAM_AUTH_URL")]
    pub upstream_auth_url: Option<String>,

    /// Secret for user token signing (required in production)
    #[arg(long, env = "TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// User token expiry in seconds
    #[arg(long, env = "TOKEN_EXPIRY_SECONDS", default_value = "3600")]
    pub token_expiry_seconds: u64,

    /// Validity window of downstream authorizations in seconds
    #[arg(long, env = "CREDENTIAL_TTL_SECONDS", default_value = "1800")]
    pub credential_ttl_seconds: u64,

    /// Time a client has to answer a challenge
    #[arg(
        long,
        env = "HANDSHAKE_TIMEOUT_SECS",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..=300)
    )]
    pub handshake_timeout_secs: u64,

    /// Maximum concurrent WebSocket sessions
    #[arg(long, env = "MAX_CONNECTIONS", default_value = "10000")]
    pub max_connections: usize,

    /// Serve the direct credential fetch (no proof of key possession)
    #[arg(long, env = "DIRECT_CREDENTIALS", default_value = "true", action = ArgAction::Set)]
    pub direct_credentials: bool,

    /// Enable development mode (insecure default secrets)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Args {
    /// Effective service key (placeholder in dev mode)
    pub fn user_api_key(&self) -> String {
        self.user_api_key
            .clone()
            .unwrap_or_else(|| DEV_API_KEY.to_string())
    }

    /// Effective service secret (placeholder in dev mode)
    pub fn user_api_secret(&self) -> String {
        self.user_api_secret
            .clone()
            .unwrap_or_else(|| DEV_API_SECRET.to_string())
    }

    /// Token issuer name carried in the `iss` claim
    pub fn token_issuer(&self) -> String {
        format!("keyhole-{}", self.node_id)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match self.token_secret.as_deref() {
                None => return Err("TOKEN_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "TOKEN_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }

            if self.user_api_key.as_deref().unwrap_or("").is_empty() {
                return Err("USER_API_KEY is required in production mode".to_string());
            }

            if self.upstream_auth_url.is_none()
                && self.user_api_secret.as_deref().unwrap_or("").is_empty()
            {
                return Err(
                    "USER_API_SECRET or UPSTREAM_AUTH_URL is required in production mode"
                        .to_string(),
                );
            }
        }

        if self.credential_ttl_seconds == 0 {
            return Err("CREDENTIAL_TTL_SECONDS must be positive".to_string());
        }

        if self.max_connections == 0 {
            return Err("MAX_CONNECTIONS must be positive".to_string());
        }

        Ok(())
    }
}
