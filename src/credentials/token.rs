//! User tokens for verified identities
//!
//! Tokens are HS256 JWTs whose subject is the public identifier that passed
//! the challenge. Downstream services holding the same secret can validate
//! them with [`JwtTokenAuthority::verify_token`].

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::identity::PublicIdentifier;
use crate::types::{KeyholeError, Result};

/// Minimum accepted secret length outside dev mode
pub const MIN_SECRET_LEN: usize = 32;

const DEV_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Issues user tokens for identities that proved key possession
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    async fn issue_token(&self, public_identifier: &PublicIdentifier) -> Result<String>;
}

/// Claims carried in a user token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Public identifier of the verified key
    pub sub: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// HS256 token authority
#[derive(Clone)]
pub struct JwtTokenAuthority {
    secret: String,
    issuer: String,
    expiry_seconds: u64,
}

impl JwtTokenAuthority {
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, issuer: String, expiry_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(KeyholeError::Config(
                "TOKEN_SECRET is required in production mode".into(),
            ));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(KeyholeError::Config(format!(
                "TOKEN_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            secret,
            issuer,
            expiry_seconds,
        })
    }

    /// Authority for dev mode with a fixed, public secret
    pub fn new_dev(issuer: String) -> Self {
        Self {
            secret: DEV_SECRET.into(),
            issuer,
            expiry_seconds: 3600,
        }
    }

    pub fn generate_token(&self, public_identifier: &PublicIdentifier) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| KeyholeError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = TokenClaims {
            sub: public_identifier.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| KeyholeError::UpstreamAuthFailure(format!("Failed to generate token: {}", e)))
    }

    /// Decode and validate a token (signature, expiry, issuer)
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Invalid signature",
                ErrorKind::InvalidIssuer => "Invalid issuer",
                _ => "Token validation failed",
            };
            KeyholeError::Rejected(msg.into())
        })
    }
}

impl std::fmt::Debug for JwtTokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenAuthority")
            .field("issuer", &self.issuer)
            .field("expiry_seconds", &self.expiry_seconds)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenAuthority for JwtTokenAuthority {
    async fn issue_token(&self, public_identifier: &PublicIdentifier) -> Result<String> {
        self.generate_token(public_identifier)
    }
}
