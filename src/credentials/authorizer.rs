//! Downstream service authorization
//!
//! The downstream service accepts requests carrying its public service key,
//! an expiry timestamp and an HMAC of that timestamp made with the matching
//! service secret. The secret stays on this server; clients only ever see the
//! signature.
//!
//! Two sources are supported:
//! - [`HmacAuthorizer`] signs locally with the configured secret
//! - [`RemoteAuthorizer`] fetches a signed payload from an HTTP endpoint

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::types::{KeyholeError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signed authorization valid until `expires_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAuthorization {
    pub signature: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ApiAuthorization {
    /// The exact bytes covered by `signature`
    pub fn signed_message(&self) -> String {
        signed_message(&self.expires_at)
    }
}

fn signed_message(expires_at: &DateTime<Utc>) -> String {
    expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Source of downstream authorizations
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    async fn authorize(&self) -> Result<ApiAuthorization>;
}

/// Signs authorizations locally with the service secret
pub struct HmacAuthorizer {
    secret: String,
    ttl: Duration,
}

impl HmacAuthorizer {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(KeyholeError::Config("service API secret is empty".into()));
        }
        Ok(Self { secret, ttl })
    }

    /// Check an authorization produced with the same secret
    pub fn verify(&self, authorization: &ApiAuthorization) -> bool {
        let Ok(expected) = BASE64_URL_SAFE_NO_PAD.decode(authorization.signature.as_bytes()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        mac.update(authorization.signed_message().as_bytes());
        mac.verify_slice(&expected).is_ok() && Utc::now() < authorization.expires_at
    }

    fn sign(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| KeyholeError::UpstreamAuthFailure(format!("invalid secret: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl AuthorizationService for HmacAuthorizer {
    async fn authorize(&self) -> Result<ApiAuthorization> {
        // Whole seconds so the serialized timestamp is the signed message
        let issued_at = Utc::now().trunc_subsecs(0);
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| KeyholeError::Config(format!("credential TTL out of range: {}", e)))?;
        let expires_at = issued_at + ttl;

        let signature = self.sign(&signed_message(&expires_at))?;
        debug!(expires_at = %expires_at, "Signed downstream authorization");

        Ok(ApiAuthorization {
            signature,
            issued_at,
            expires_at,
        })
    }
}

/// Fetches authorizations from an HTTP endpoint
pub struct RemoteAuthorizer {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl RemoteAuthorizer {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyholeError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl AuthorizationService for RemoteAuthorizer {
    async fn authorize(&self) -> Result<ApiAuthorization> {
        let response = self
            .client
            .get(&self.url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| KeyholeError::UpstreamAuthFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, status = %status, "Upstream authorization rejected");
            return Err(KeyholeError::UpstreamAuthFailure(format!(
                "upstream returned {}",
                status
            )));
        }

        response
            .json::<ApiAuthorization>()
            .await
            .map_err(|e| KeyholeError::UpstreamAuthFailure(format!("invalid payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer() -> HmacAuthorizer {
        HmacAuthorizer::new("service-secret", Duration::from_secs(600)).unwrap()
    }

    #[tokio::test]
    async fn test_authorize_window() {
        let auth = authorizer().authorize().await.unwrap();
        assert_eq!((auth.expires_at - auth.issued_at).num_seconds(), 600);
        assert!(!auth.signature.is_empty());
    }

    #[tokio::test]
    async fn test_signature_verifies_with_same_secret() {
        let a = authorizer();
        let auth = a.authorize().await.unwrap();
        assert!(a.verify(&auth));

        let other = HmacAuthorizer::new("other-secret", Duration::from_secs(600)).unwrap();
        assert!(!other.verify(&auth));
    }

    #[tokio::test]
    async fn test_tampered_expiry_fails() {
        let a = authorizer();
        let mut auth = a.authorize().await.unwrap();
        auth.expires_at = auth.expires_at + chrono::Duration::seconds(3600);
        assert!(!a.verify(&auth));
    }

    #[tokio::test]
    async fn test_signed_message_survives_json() {
        let auth = authorizer().authorize().await.unwrap();
        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["expiresAt"], auth.signed_message());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            HmacAuthorizer::new("", Duration::from_secs(60)),
            Err(KeyholeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_upstream_failure() {
        // Port 9 (discard) on loopback is not listening in test environments
        let remote =
            RemoteAuthorizer::new("http://127.0.0.1:9/auth", "key", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            remote.authorize().await,
            Err(KeyholeError::UpstreamAuthFailure(_))
        ));
    }
}
