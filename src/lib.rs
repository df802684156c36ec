//! keyhole - challenge-response key login
//!
//! A client that holds an Ed25519 signing key proves possession of it over a
//! WebSocket and receives time-bounded credentials for a downstream service.
//! The private key never leaves the client.
//!
//! ## Flows
//!
//! - **Challenge login**: `token-request` → `challenge` → `challenge-response`
//!   → `token-response`, one handshake at a time per connection
//! - **Direct fetch**: `GET /credentials` returns a tokenless bundle with no
//!   proof of key possession

pub mod channel;
pub mod client;
pub mod config;
pub mod credentials;
pub mod handshake;
pub mod identity;
pub mod logging;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{KeyholeError, Result};
