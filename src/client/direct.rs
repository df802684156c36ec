//! Direct credential fetch
//!
//! One GET, no identity, no proof of key possession. Anyone who can reach
//! the endpoint gets a bundle, so prefer [`super::login_with_challenge`].

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::credentials::CredentialBundle;
use crate::types::{KeyholeError, Result};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Fetch a tokenless bundle from `{base_url}/credentials`
pub async fn fetch_credentials(base_url: &str) -> Result<CredentialBundle> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| KeyholeError::Config(format!("Failed to build HTTP client: {}", e)))?;

    let url = format!("{}/credentials", base_url.trim_end_matches('/'));
    debug!(url = %url, "Fetching credentials");

    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        return Err(KeyholeError::Rejected(message));
    }

    Ok(response.json::<CredentialBundle>().await?)
}
