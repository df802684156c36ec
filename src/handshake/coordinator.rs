//! Challenge coordinator
//!
//! Issues a random challenge on the requesting channel and waits for the
//! signature on that same channel. The wait only ever reads the requester's
//! own inbound stream, so concurrent handshakes on other connections cannot
//! satisfy or disturb it.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::registry::HandshakeRegistry;
use super::verifier::Verifier;
use crate::channel::{Channel, Inbound};
use crate::credentials::{CredentialBundle, TokenIssuer};
use crate::identity::PublicIdentifier;
use crate::protocol::{Envelope, CHALLENGE_SIZE};
use crate::types::{KeyholeError, Result};

/// Default time a client has to answer a challenge
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ChallengeCoordinator {
    verifier: Arc<dyn Verifier>,
    issuer: Arc<TokenIssuer>,
    registry: Arc<HandshakeRegistry>,
    timeout: Duration,
}

impl ChallengeCoordinator {
    pub fn new(
        verifier: Arc<dyn Verifier>,
        issuer: Arc<TokenIssuer>,
        registry: Arc<HandshakeRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            issuer,
            registry,
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<HandshakeRegistry> {
        &self.registry
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one challenge for `public_identifier` on `channel`.
    ///
    /// The challenge lives only in this call. One deadline, taken before the
    /// challenge goes out, bounds every send and receive of the attempt.
    /// Every exit path, including the future being dropped, releases the
    /// registry entry.
    pub async fn resolve_token(
        &self,
        public_identifier: &PublicIdentifier,
        channel: &mut Channel,
    ) -> Result<CredentialBundle> {
        if public_identifier.is_empty() {
            return Err(KeyholeError::MissingIdentifier);
        }

        let connection = channel.id();
        let _pending = self.registry.begin(connection, public_identifier.clone())?;

        let mut challenge = [0u8; CHALLENGE_SIZE];
        OsRng.fill_bytes(&mut challenge);

        let deadline = Instant::now() + self.timeout;
        channel
            .send_before(Envelope::challenge(&challenge), deadline)
            .await?;
        debug!(connection = %connection, identifier = %public_identifier, "Challenge sent");

        let signature = self.await_signature(channel, deadline).await.inspect_err(|e| {
            debug!(connection = %connection, error = %e, "Handshake abandoned");
        })?;

        if !self.verifier.verify(public_identifier, &challenge, &signature) {
            warn!(connection = %connection, identifier = %public_identifier, "Invalid challenge signature");
            return Err(KeyholeError::InvalidSignature);
        }

        info!(connection = %connection, identifier = %public_identifier, "Challenge verified");
        self.issuer.issue_for(public_identifier).await
    }

    async fn await_signature(&self, channel: &mut Channel, deadline: Instant) -> Result<Vec<u8>> {
        loop {
            let item = match tokio::time::timeout_at(deadline, channel.recv()).await {
                Err(_) => return Err(KeyholeError::HandshakeTimeout),
                Ok(None) => return Err(KeyholeError::ChannelClosed),
                Ok(Some(item)) => item,
            };

            match item {
                Inbound::Envelope(Envelope::ChallengeResponse(response)) => {
                    return Ok(response.signature)
                }
                Inbound::Envelope(Envelope::TokenRequest(_)) => {
                    warn!(connection = %channel.id(), "Token request while a handshake is pending");
                    let err = KeyholeError::ProtocolViolation(
                        "handshake already in progress on this connection".to_string(),
                    );
                    channel
                        .send_before(Envelope::from_error(&err), deadline)
                        .await?;
                }
                Inbound::Envelope(other) => {
                    return Err(KeyholeError::ProtocolViolation(format!(
                        "unexpected {} while awaiting challenge response",
                        other.kind()
                    )))
                }
                Inbound::Malformed(reason) => {
                    warn!(connection = %channel.id(), reason = %reason, "Malformed frame during handshake");
                    return Err(KeyholeError::ProtocolViolation(reason));
                }
            }
        }
    }
}
