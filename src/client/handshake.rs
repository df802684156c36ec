//! Client handshake state machine
//!
//! Transport-free: feed it what arrived, send what it returns.
//!
//! ```text
//!   Idle ──start──▶ AwaitingChallenge ──challenge──▶ AwaitingToken ──token-response──▶ Done
//!                          │                               │
//!                          └──── error / unexpected / closed ──▶ Failed
//! ```

use crate::channel::Inbound;
use crate::credentials::CredentialBundle;
use crate::identity::Signer;
use crate::protocol::{Envelope, CHALLENGE_SIZE};
use crate::types::KeyholeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    AwaitingChallenge,
    AwaitingToken,
    Done,
    Failed,
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// What the caller should do after feeding an input
#[derive(Debug)]
pub enum Step {
    /// Send this envelope to the server
    Send(Envelope),
    /// Handshake finished
    Complete(CredentialBundle),
    /// Handshake failed
    Fail(KeyholeError),
    /// Input arrived in a terminal state
    Ignore,
}

/// One login attempt. The identity is borrowed for the attempt only.
pub struct HandshakeClient<'a> {
    signer: &'a dyn Signer,
    state: HandshakeState,
}

impl<'a> HandshakeClient<'a> {
    pub fn new(signer: &'a dyn Signer) -> Self {
        Self {
            signer,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Emit the `token-request`
    pub fn start(&mut self) -> Step {
        match self.state {
            HandshakeState::Idle => {
                self.state = HandshakeState::AwaitingChallenge;
                Step::Send(Envelope::token_request(
                    self.signer.public_identifier().as_str(),
                ))
            }
            HandshakeState::Done | HandshakeState::Failed => Step::Ignore,
            _ => self.fail(KeyholeError::ProtocolViolation(
                "handshake already started".to_string(),
            )),
        }
    }

    pub fn on_envelope(&mut self, envelope: Envelope) -> Step {
        if self.state.is_terminal() {
            return Step::Ignore;
        }

        match (self.state, envelope) {
            (_, Envelope::Error(e)) => self.fail(KeyholeError::Rejected(e.message)),
            (HandshakeState::AwaitingChallenge, Envelope::Challenge(c)) => {
                if c.value.len() != CHALLENGE_SIZE {
                    return self.fail(KeyholeError::ProtocolViolation(format!(
                        "challenge must be {} bytes, got {}",
                        CHALLENGE_SIZE,
                        c.value.len()
                    )));
                }
                self.state = HandshakeState::AwaitingToken;
                Step::Send(Envelope::challenge_response(self.signer.sign(&c.value)))
            }
            (HandshakeState::AwaitingToken, Envelope::TokenResponse(bundle)) => {
                if !bundle.has_token() {
                    return self.fail(KeyholeError::ProtocolViolation(
                        "token response carries no token".to_string(),
                    ));
                }
                self.state = HandshakeState::Done;
                Step::Complete(bundle)
            }
            (state, other) => self.fail(KeyholeError::ProtocolViolation(format!(
                "unexpected {} in state {:?}",
                other.kind(),
                state
            ))),
        }
    }

    pub fn on_inbound(&mut self, inbound: Inbound) -> Step {
        match inbound {
            Inbound::Envelope(env) => self.on_envelope(env),
            Inbound::Malformed(reason) => self.on_malformed(reason),
        }
    }

    pub fn on_malformed(&mut self, reason: String) -> Step {
        if self.state.is_terminal() {
            return Step::Ignore;
        }
        self.fail(KeyholeError::ProtocolViolation(reason))
    }

    pub fn on_closed(&mut self) -> Step {
        if self.state.is_terminal() {
            return Step::Ignore;
        }
        self.fail(KeyholeError::ChannelClosed)
    }

    fn fail(&mut self, err: KeyholeError) -> Step {
        self.state = HandshakeState::Failed;
        Step::Fail(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::authorizer::ApiAuthorization;
    use crate::handshake::verify;
    use crate::identity::Ed25519Signer;
    use chrono::Utc;

    fn bundle(token: Option<&str>) -> CredentialBundle {
        let now = Utc::now();
        CredentialBundle::new(
            "svc",
            ApiAuthorization {
                signature: "sig".into(),
                issued_at: now,
                expires_at: now + chrono::Duration::seconds(60),
            },
            token.map(str::to_string),
        )
    }

    #[test]
    fn test_happy_path() {
        let signer = Ed25519Signer::generate();
        let mut client = HandshakeClient::new(&signer);

        match client.start() {
            Step::Send(Envelope::TokenRequest(req)) => assert_eq!(
                req.public_identifier.as_deref(),
                Some(signer.public_identifier().as_str())
            ),
            other => panic!("expected token request, got {:?}", other),
        }
        assert_eq!(client.state(), HandshakeState::AwaitingChallenge);

        let challenge = [9u8; CHALLENGE_SIZE];
        match client.on_envelope(Envelope::challenge(&challenge)) {
            Step::Send(Envelope::ChallengeResponse(resp)) => {
                assert!(verify(&signer.public_identifier(), &challenge, &resp.signature))
            }
            other => panic!("expected challenge response, got {:?}", other),
        }
        assert_eq!(client.state(), HandshakeState::AwaitingToken);

        assert!(matches!(
            client.on_envelope(Envelope::token_response(bundle(Some("tok")))),
            Step::Complete(_)
        ));
        assert_eq!(client.state(), HandshakeState::Done);
    }

    #[test]
    fn test_error_envelope_rejects() {
        let signer = Ed25519Signer::generate();
        let mut client = HandshakeClient::new(&signer);
        client.start();

        match client.on_envelope(Envelope::error("invalid signature")) {
            Step::Fail(KeyholeError::Rejected(msg)) => assert_eq!(msg, "invalid signature"),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(client.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_token_before_challenge_is_violation() {
        let signer = Ed25519Signer::generate();
        let mut client = HandshakeClient::new(&signer);
        client.start();

        assert!(matches!(
            client.on_envelope(Envelope::token_response(bundle(Some("tok")))),
            Step::Fail(KeyholeError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_short_challenge_is_violation() {
        let signer = Ed25519Signer::generate();
        let mut client = HandshakeClient::new(&signer);
        client.start();

        let env = Envelope::Challenge(crate::protocol::ChallengePayload { value: vec![1, 2, 3] });
        assert!(matches!(
            client.on_envelope(env),
            Step::Fail(KeyholeError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_tokenless_response_is_violation() {
        let signer = Ed25519Signer::generate();
        let mut client = HandshakeClient::new(&signer);
        client.start();
        client.on_envelope(Envelope::challenge(&[0u8; CHALLENGE_SIZE]));

        assert!(matches!(
            client.on_envelope(Envelope::token_response(bundle(None))),
            Step::Fail(KeyholeError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_closed_before_done() {
        let signer = Ed25519Signer::generate();
        let mut client = HandshakeClient::new(&signer);
        client.start();

        assert!(matches!(
            client.on_closed(),
            Step::Fail(KeyholeError::ChannelClosed)
        ));
    }

    #[test]
    fn test_terminal_states_ignore_input() {
        let signer = Ed25519Signer::generate();
        let mut client = HandshakeClient::new(&signer);
        client.start();
        client.on_malformed("garbage".into());
        assert_eq!(client.state(), HandshakeState::Failed);

        assert!(matches!(
            client.on_envelope(Envelope::challenge(&[0u8; CHALLENGE_SIZE])),
            Step::Ignore
        ));
        assert!(matches!(client.on_closed(), Step::Ignore));
        assert!(matches!(client.start(), Step::Ignore));
    }
}
