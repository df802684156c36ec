//! Direct credential fetch
//!
//! Returns a tokenless bundle to anyone who asks. Weaker than the challenge
//! login; can be turned off with `--direct-credentials false`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::{error, info};

use crate::server::http::{error_response, json_response};
use crate::server::AppState;
use crate::types::KeyholeError;

/// `GET /credentials` and `GET /api/userAuth`
pub async fn direct_credentials(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let bundle = match state.issuer.direct().await {
        Ok(bundle) => bundle,
        Err(err) => return error_response(err),
    };

    match serde_json::to_string(&bundle) {
        Ok(json) => {
            info!(expires_at = %bundle.expires_at, "Direct credentials issued");
            json_response(StatusCode::OK, json)
        }
        Err(e) => {
            error!(error = %e, "Failed to encode credential bundle");
            error_response(KeyholeError::Internal(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use clap::Parser;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_direct_returns_tokenless_bundle() {
        let args = Args::try_parse_from(["keyhole", "--dev-mode"]).unwrap();
        let state = Arc::new(AppState::new(args).unwrap());

        let response = direct_credentials(state).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["serviceKey"], "dev-service-key");
        assert!(json["authSignature"].as_str().is_some_and(|s| !s.is_empty()));
        assert!(json.get("token").is_none());
    }
}
