//! Server side of one credential channel
//!
//! Reads envelopes until the peer leaves. Each `token-request` runs a full
//! challenge through the coordinator and is answered with either a
//! `token-response` or an `error` envelope. Failed attempts leave the
//! session open so the client can try again. A reply the peer will not
//! accept within the handshake timeout ends the session.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::coordinator::ChallengeCoordinator;
use crate::channel::{Channel, Inbound};
use crate::identity::PublicIdentifier;
use crate::protocol::Envelope;
use crate::types::{KeyholeError, Result};

/// Drive `channel` until it closes
pub async fn serve(coordinator: Arc<ChallengeCoordinator>, mut channel: Channel) {
    let connection = channel.id();
    info!(connection = %connection, "Session opened");

    while let Some(item) = channel.recv().await {
        let outcome = match item {
            Inbound::Envelope(Envelope::TokenRequest(request)) => {
                let pk = PublicIdentifier::new(request.public_identifier.unwrap_or_default());
                handle_token_request(&coordinator, &pk, &mut channel).await
            }
            Inbound::Envelope(other) => {
                let err = KeyholeError::ProtocolViolation(format!(
                    "{} without a pending token request",
                    other.kind()
                ));
                warn!(connection = %connection, error = %err, "Unexpected envelope");
                reply(&coordinator, &channel, Envelope::from_error(&err)).await
            }
            Inbound::Malformed(reason) => {
                warn!(connection = %connection, reason = %reason, "Malformed envelope");
                let err = KeyholeError::ProtocolViolation(reason);
                reply(&coordinator, &channel, Envelope::from_error(&err)).await
            }
        };

        if let Err(err) = outcome {
            debug!(connection = %connection, error = %err, "Ending session");
            break;
        }
    }

    info!(connection = %connection, "Session closed");
}

async fn reply(
    coordinator: &ChallengeCoordinator,
    channel: &Channel,
    envelope: Envelope,
) -> Result<()> {
    channel
        .send_before(envelope, Instant::now() + coordinator.timeout())
        .await
}

async fn handle_token_request(
    coordinator: &ChallengeCoordinator,
    pk: &PublicIdentifier,
    channel: &mut Channel,
) -> Result<()> {
    match coordinator.resolve_token(pk, channel).await {
        Ok(bundle) => {
            debug!(connection = %channel.id(), identifier = %pk, "Sending token response");
            reply(coordinator, channel, Envelope::token_response(bundle)).await
        }
        Err(KeyholeError::ChannelClosed) => Err(KeyholeError::ChannelClosed),
        Err(err) => {
            if err.is_handshake_failure() {
                warn!(connection = %channel.id(), error = %err, "Handshake failed");
            } else {
                error!(connection = %channel.id(), error = %err, "Handshake aborted by internal error");
            }
            reply(coordinator, channel, Envelope::from_error(&err)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::coordinator::tests::{coordinator, spawn_request_flood};
    use crate::identity::{Ed25519Signer, Signer};
    use std::time::Duration;

    async fn next_envelope(client: &mut Channel) -> Envelope {
        match client.recv().await {
            Some(Inbound::Envelope(env)) => env,
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_session() {
        let coordinator = coordinator(Duration::from_secs(5));
        let signer = Ed25519Signer::generate();
        let (server, mut client) = Channel::pair();
        let task = tokio::spawn(serve(Arc::clone(&coordinator), server));

        client
            .send(Envelope::token_request(signer.public_identifier().as_str()))
            .await
            .unwrap();
        let challenge = match next_envelope(&mut client).await {
            Envelope::Challenge(c) => c.value,
            other => panic!("expected challenge, got {:?}", other),
        };
        client
            .send(Envelope::challenge_response(signer.sign(&challenge)))
            .await
            .unwrap();

        match next_envelope(&mut client).await {
            Envelope::TokenResponse(bundle) => {
                assert!(bundle.has_token());
                assert_eq!(bundle.service_key, "service-key");
            }
            other => panic!("expected token response, got {:?}", other),
        }

        drop(client);
        task.await.unwrap();
        assert_eq!(coordinator.registry().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_response_without_request_is_protocol_violation() {
        let coordinator = coordinator(Duration::from_secs(5));
        let (server, mut client) = Channel::pair();
        tokio::spawn(serve(coordinator, server));

        client
            .send(Envelope::challenge_response(vec![0u8; 64]))
            .await
            .unwrap();
        assert_eq!(
            next_envelope(&mut client).await,
            Envelope::error("protocol violation")
        );
    }

    #[tokio::test]
    async fn test_missing_identifier_answered() {
        let coordinator = coordinator(Duration::from_secs(5));
        let (server, mut client) = Channel::pair();
        tokio::spawn(serve(coordinator, server));

        client
            .send_raw(r#"{"type":"token-request","payload":{}}"#)
            .await
            .unwrap();
        assert_eq!(
            next_envelope(&mut client).await,
            Envelope::error("missing public identifier")
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_session_open() {
        let coordinator = coordinator(Duration::from_secs(5));
        let signer = Ed25519Signer::generate();
        let (server, mut client) = Channel::pair();
        tokio::spawn(serve(coordinator, server));

        client.send_raw("{{{").await.unwrap();
        assert_eq!(
            next_envelope(&mut client).await,
            Envelope::error("protocol violation")
        );

        client
            .send(Envelope::token_request(signer.public_identifier().as_str()))
            .await
            .unwrap();
        assert!(matches!(
            next_envelope(&mut client).await,
            Envelope::Challenge(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_and_retry_allowed() {
        let coordinator = coordinator(Duration::from_secs(30));
        let signer = Ed25519Signer::generate();
        let (server, mut client) = Channel::pair();
        tokio::spawn(serve(Arc::clone(&coordinator), server));

        client
            .send(Envelope::token_request(signer.public_identifier().as_str()))
            .await
            .unwrap();
        assert!(matches!(
            next_envelope(&mut client).await,
            Envelope::Challenge(_)
        ));
        assert_eq!(
            next_envelope(&mut client).await,
            Envelope::error("handshake timed out")
        );
        assert_eq!(coordinator.registry().pending_count(), 0);

        client
            .send(Envelope::token_request(signer.public_identifier().as_str()))
            .await
            .unwrap();
        let challenge = match next_envelope(&mut client).await {
            Envelope::Challenge(c) => c.value,
            other => panic!("expected challenge, got {:?}", other),
        };
        client
            .send(Envelope::challenge_response(signer.sign(&challenge)))
            .await
            .unwrap();
        assert!(matches!(
            next_envelope(&mut client).await,
            Envelope::TokenResponse(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_flood_without_reads_ends_session() {
        let coordinator = coordinator(Duration::from_secs(30));
        let signer = Ed25519Signer::generate();
        let (server, client) = Channel::pair();
        let task = tokio::spawn(serve(Arc::clone(&coordinator), server));
        let _flood = spawn_request_flood(client, signer.public_identifier(), 500);

        tokio::time::timeout(Duration::from_secs(600), task)
            .await
            .expect("session stalled on a peer that never reads")
            .unwrap();
        assert_eq!(coordinator.registry().pending_count(), 0);
    }
}
