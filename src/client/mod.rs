//! Client side of the login flows

pub mod direct;
pub mod handshake;
pub mod login;

pub use direct::fetch_credentials;
pub use handshake::{HandshakeClient, HandshakeState, Step};
pub use login::{login_with_challenge, run_handshake};
