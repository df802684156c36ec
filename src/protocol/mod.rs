//! Handshake wire protocol
//!
//! Messages (all JSON text frames):
//! - `token-request` (client -> server) - `{publicIdentifier}`
//! - `challenge` (server -> client) - `{value: [u8; 32]}`
//! - `challenge-response` (client -> server) - `{signature: [u8]}`
//! - `token-response` (server -> client) - credential bundle
//! - `error` (server -> client) - `{message}`

pub mod envelope;

pub use envelope::{
    ChallengePayload, ChallengeResponse, Envelope, ErrorPayload, TokenRequest, CHALLENGE_SIZE,
};
