//! WebSocket upgrade into a handshake session

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::{info, warn};

use crate::channel::{ws, ConnectionId};
use crate::handshake::session;
use crate::server::http::{bad_request_response, unavailable_response, AppState};

/// Upgrade `req` and spawn a session on the resulting socket
pub fn handle_upgrade(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let active = state.registry.active_sessions();
    if active >= state.args.max_connections {
        warn!(active, max = state.args.max_connections, "At capacity, rejecting upgrade");
        return unavailable_response("Too many connections");
    }

    match hyper_tungstenite::upgrade(req, None) {
        Ok((response, websocket)) => {
            // Counted before the spawn so concurrent upgrades see it
            let session_guard = state.registry.open_session();
            let coordinator = Arc::clone(&state.coordinator);

            tokio::spawn(async move {
                let _session_guard = session_guard;
                match websocket.await {
                    Ok(stream) => {
                        let connection = ConnectionId::new();
                        info!(connection = %connection, "WebSocket connected");
                        session::serve(coordinator, ws::attach(stream, connection)).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "WebSocket upgrade failed");
                    }
                }
            });

            response
        }
        Err(e) => {
            warn!(error = %e, "Invalid WebSocket upgrade request");
            bad_request_response(&format!("WebSocket upgrade failed: {}", e))
        }
    }
}
