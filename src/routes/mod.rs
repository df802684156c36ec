//! HTTP routes for keyhole

pub mod credentials;
pub mod health;

pub use credentials::direct_credentials;
pub use health::{health_check, HealthResponse};
