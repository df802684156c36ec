//! Liveness endpoint

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::http::json_response;
use crate::server::AppState;

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Git commit the binary was built from
    pub commit: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub active_sessions: usize,
    pub pending_handshakes: usize,
    /// Age in seconds of the longest-waiting handshake, if any
    pub oldest_pending_secs: Option<u64>,
    pub direct_credentials: bool,
    pub mode: &'static str,
    pub node_id: String,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        uptime: state.started_at.elapsed().as_secs(),
        active_sessions: state.registry.active_sessions(),
        pending_handshakes: state.registry.pending_count(),
        oldest_pending_secs: state
            .registry
            .oldest_pending_age()
            .map(|age| age.as_secs()),
        direct_credentials: state.args.direct_credentials,
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
    }
}

/// `GET /health`
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = build_health_response(&state);
    match serde_json::to_string(&body) {
        Ok(json) => json_response(StatusCode::OK, json),
        Err(_) => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"Internal serialization error"}"#.to_string(),
        ),
    }
}
