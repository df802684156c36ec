//! Token issuer
//!
//! Packages a user token and a downstream authorization into a
//! [`CredentialBundle`]. Stateless; shared across sessions behind an `Arc`.

use std::sync::Arc;

use tracing::{error, info};

use super::authorizer::AuthorizationService;
use super::bundle::CredentialBundle;
use super::token::TokenAuthority;
use crate::identity::PublicIdentifier;
use crate::types::{KeyholeError, Result};

pub struct TokenIssuer {
    service_key: String,
    authority: Arc<dyn TokenAuthority>,
    authorizer: Arc<dyn AuthorizationService>,
}

impl TokenIssuer {
    pub fn new(
        service_key: impl Into<String>,
        authority: Arc<dyn TokenAuthority>,
        authorizer: Arc<dyn AuthorizationService>,
    ) -> Self {
        Self {
            service_key: service_key.into(),
            authority,
            authorizer,
        }
    }

    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    /// Bundle for an identity whose signature has already been verified
    pub async fn issue_for(&self, public_identifier: &PublicIdentifier) -> Result<CredentialBundle> {
        let token = self
            .authority
            .issue_token(public_identifier)
            .await
            .map_err(upstream)?;
        let bundle = self.issue(token, &self.service_key).await?;
        info!(identifier = %public_identifier, expires_at = %bundle.expires_at, "Issued credential bundle");
        Ok(bundle)
    }

    /// Merge an already obtained token with a fresh authorization
    pub async fn issue(&self, token: String, service_key: &str) -> Result<CredentialBundle> {
        let authorization = self.authorizer.authorize().await.map_err(upstream)?;
        Ok(CredentialBundle::new(service_key, authorization, Some(token)))
    }

    /// Authorization only, with no proof of key possession
    pub async fn direct(&self) -> Result<CredentialBundle> {
        let authorization = self.authorizer.authorize().await.map_err(upstream)?;
        Ok(CredentialBundle::new(&self.service_key, authorization, None))
    }
}

fn upstream(err: KeyholeError) -> KeyholeError {
    match err {
        KeyholeError::UpstreamAuthFailure(_) => {
            error!(error = %err, "Upstream authorization failed");
            err
        }
        other => {
            error!(error = %other, "Upstream authorization failed");
            KeyholeError::UpstreamAuthFailure(other.to_string())
        }
    }
}
