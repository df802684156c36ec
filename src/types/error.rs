//! Error types for keyhole
//!
//! One enum covers the handshake taxonomy and the ambient failures of the
//! HTTP/WebSocket surface.

use hyper::StatusCode;

/// Main error type for keyhole operations
#[derive(Debug, thiserror::Error)]
pub enum KeyholeError {
    #[error("Missing public identifier")]
    MissingIdentifier,

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Handshake timed out waiting for challenge response")]
    HandshakeTimeout,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Upstream authorization failed: {0}")]
    UpstreamAuthFailure(String),

    /// The server answered with an `error` envelope
    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KeyholeError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingIdentifier => StatusCode::BAD_REQUEST,
            Self::ProtocolViolation(_) => StatusCode::BAD_REQUEST,
            Self::HandshakeTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::ChannelClosed => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::UpstreamAuthFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Rejected(_) => StatusCode::UNAUTHORIZED,
            Self::WebSocket(_) => StatusCode::BAD_GATEWAY,
            Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to put on the wire.
    ///
    /// Variants that carry internal detail collapse to a fixed string; the
    /// detail stays in the server log.
    pub fn wire_message(&self) -> String {
        match self {
            Self::MissingIdentifier => "missing public identifier".to_string(),
            Self::ProtocolViolation(_) => "protocol violation".to_string(),
            Self::HandshakeTimeout => "handshake timed out".to_string(),
            Self::ChannelClosed => "channel closed".to_string(),
            Self::InvalidSignature => "invalid signature".to_string(),
            Self::UpstreamAuthFailure(_) => "upstream authorization failed".to_string(),
            Self::Rejected(msg) => msg.clone(),
            _ => "internal error".to_string(),
        }
    }

    /// Whether this error ends the handshake attempt it occurred in
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentifier
                | Self::ProtocolViolation(_)
                | Self::HandshakeTimeout
                | Self::ChannelClosed
                | Self::InvalidSignature
                | Self::UpstreamAuthFailure(_)
        )
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = serde_json::json!({ "error": self.wire_message() }).to_string();
        (status, body)
    }
}

impl From<std::io::Error> for KeyholeError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for KeyholeError {
    fn from(err: serde_json::Error) -> Self {
        Self::ProtocolViolation(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for KeyholeError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for KeyholeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<reqwest::Error> for KeyholeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for KeyholeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::UpstreamAuthFailure(format!("JWT error: {}", err))
    }
}

/// Result type alias for keyhole operations
pub type Result<T> = std::result::Result<T, KeyholeError>;
