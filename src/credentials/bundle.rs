//! Credential bundle returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::authorizer::ApiAuthorization;

/// Authorization payload usable against the downstream service.
///
/// `token` is only present when the client proved key possession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBundle {
    /// Public key of the downstream service account
    pub service_key: String,
    /// Signature over `expiresAt`, produced with the service secret
    pub auth_signature: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl CredentialBundle {
    pub fn new(service_key: &str, authorization: ApiAuthorization, token: Option<String>) -> Self {
        Self {
            service_key: service_key.to_string(),
            auth_signature: authorization.signature,
            issued_at: authorization.issued_at,
            expires_at: authorization.expires_at,
            token,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The authorization half, as the downstream service will check it
    pub fn authorization(&self) -> ApiAuthorization {
        ApiAuthorization {
            signature: self.auth_signature.clone(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn authorization(ttl_secs: i64) -> ApiAuthorization {
        let now = Utc::now();
        ApiAuthorization {
            signature: "sig".into(),
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        }
    }

    #[test]
    fn test_direct_bundle_omits_token() {
        let bundle = CredentialBundle::new("svc", authorization(60), None);
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["serviceKey"], "svc");
        assert_eq!(json["authSignature"], "sig");
        assert!(json.get("token").is_none());
        assert!(json.get("issuedAt").is_some());
        assert!(json.get("expiresAt").is_some());
        assert!(!bundle.has_token());
    }

    #[test]
    fn test_expiry() {
        assert!(!CredentialBundle::new("svc", authorization(60), None).is_expired());
        assert!(CredentialBundle::new("svc", authorization(-1), None).is_expired());
    }

    #[test]
    fn test_empty_token_does_not_count() {
        let bundle = CredentialBundle::new("svc", authorization(60), Some(String::new()));
        assert!(!bundle.has_token());
    }
}
