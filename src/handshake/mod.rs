//! Challenge-response handshake (server side)
//!
//! ```text
//!   client                       server
//!     │ token-request {pk}         │
//!     │ ─────────────────────────▶ │  registry.begin(connection)
//!     │          challenge {value} │
//!     │ ◀───────────────────────── │
//!     │ challenge-response {sig}   │
//!     │ ─────────────────────────▶ │  verify(pk, value, sig)
//!     │     token-response {bundle}│
//!     │ ◀───────────────────────── │  issuer.issue_for(pk)
//! ```

pub mod coordinator;
pub mod registry;
pub mod session;
pub mod verifier;

pub use coordinator::{ChallengeCoordinator, DEFAULT_HANDSHAKE_TIMEOUT};
pub use registry::{HandshakeRegistry, PendingGuard, PendingHandshake, SessionGuard};
pub use session::serve;
pub use verifier::{verify, Ed25519Verifier, Verifier};
