//! Handshake envelopes
//!
//! Every frame on a credential channel is a JSON object of the form
//! `{"type": "...", "payload": {...}}`. There are no message IDs: an envelope
//! belongs to whichever handshake is in flight on the connection it arrived on.

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialBundle;
use crate::types::{KeyholeError, Result};

/// Challenge size in bytes
pub const CHALLENGE_SIZE: usize = 32;

/// `token-request` payload (client -> server)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Absent or empty is answered with `MissingIdentifier`, not a parse error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_identifier: Option<String>,
}

/// `challenge` payload (server -> client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengePayload {
    pub value: Vec<u8>,
}

/// `challenge-response` payload (client -> server)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub signature: Vec<u8>,
}

/// `error` payload (server -> client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Tagged union carried over the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Envelope {
    TokenRequest(TokenRequest),
    Challenge(ChallengePayload),
    ChallengeResponse(ChallengeResponse),
    TokenResponse(CredentialBundle),
    Error(ErrorPayload),
}

impl Envelope {
    pub fn token_request(public_identifier: impl Into<String>) -> Self {
        Self::TokenRequest(TokenRequest {
            public_identifier: Some(public_identifier.into()),
        })
    }

    pub fn challenge(value: &[u8; CHALLENGE_SIZE]) -> Self {
        Self::Challenge(ChallengePayload {
            value: value.to_vec(),
        })
    }

    pub fn challenge_response(signature: Vec<u8>) -> Self {
        Self::ChallengeResponse(ChallengeResponse { signature })
    }

    pub fn token_response(bundle: CredentialBundle) -> Self {
        Self::TokenResponse(bundle)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Error envelope for a failure, using only the wire-safe message
    pub fn from_error(err: &KeyholeError) -> Self {
        Self::error(err.wire_message())
    }

    /// Wire name of the envelope type, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenRequest(_) => "token-request",
            Self::Challenge(_) => "challenge",
            Self::ChallengeResponse(_) => "challenge-response",
            Self::TokenResponse(_) => "token-response",
            Self::Error(_) => "error",
        }
    }

    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| KeyholeError::ProtocolViolation(format!("malformed envelope: {}", e)))
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| KeyholeError::Internal(format!("Failed to encode envelope: {}", e)))
    }
}
