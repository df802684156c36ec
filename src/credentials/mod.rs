//! Credential issuance
//!
//! ```text
//!   verified identifier ──▶ TokenAuthority ──▶ user token ─┐
//!                                                          ├──▶ CredentialBundle
//!   service secret ──▶ AuthorizationService ──▶ signature ─┘
//! ```
//!
//! The direct path skips the token authority and returns only the
//! authorization half. It proves nothing about key possession.

pub mod authorizer;
pub mod bundle;
pub mod issuer;
pub mod token;

pub use authorizer::{ApiAuthorization, AuthorizationService, HmacAuthorizer, RemoteAuthorizer};
pub use bundle::CredentialBundle;
pub use issuer::TokenIssuer;
pub use token::{JwtTokenAuthority, TokenAuthority, TokenClaims};
