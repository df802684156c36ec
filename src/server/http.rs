//! HTTP server with WebSocket upgrade support
//!
//! Routes:
//! - `GET /ws`, `GET /` - WebSocket upgrade into a handshake session
//! - `GET /credentials`, `GET /api/userAuth` - direct credential fetch
//! - `GET /health` - liveness
//! - `OPTIONS *` - CORS preflight

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::credentials::{
    AuthorizationService, HmacAuthorizer, JwtTokenAuthority, RemoteAuthorizer, TokenAuthority,
    TokenIssuer,
};
use crate::handshake::{ChallengeCoordinator, Ed25519Verifier, HandshakeRegistry};
use crate::routes;
use crate::server::websocket;
use crate::types::{KeyholeError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Timeout for requests to an upstream authorization endpoint
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub issuer: Arc<TokenIssuer>,
    pub coordinator: Arc<ChallengeCoordinator>,
    pub registry: Arc<HandshakeRegistry>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire collaborators from configuration
    pub fn new(args: Args) -> Result<Self> {
        let authorizer: Arc<dyn AuthorizationService> = match args.upstream_auth_url.as_deref() {
            Some(url) => Arc::new(RemoteAuthorizer::new(
                url,
                args.user_api_key(),
                UPSTREAM_TIMEOUT,
            )?),
            None => Arc::new(HmacAuthorizer::new(
                args.user_api_secret(),
                args.credential_ttl(),
            )?),
        };

        let authority: Arc<dyn TokenAuthority> = match (&args.token_secret, args.dev_mode) {
            (Some(secret), _) => Arc::new(JwtTokenAuthority::new(
                secret.clone(),
                args.token_issuer(),
                args.token_expiry_seconds,
            )?),
            (None, true) => Arc::new(JwtTokenAuthority::new_dev(args.token_issuer())),
            (None, false) => {
                return Err(KeyholeError::Config(
                    "TOKEN_SECRET is required in production mode".into(),
                ))
            }
        };

        let issuer = Arc::new(TokenIssuer::new(args.user_api_key(), authority, authorizer));
        let registry = Arc::new(HandshakeRegistry::new());
        let coordinator = Arc::new(ChallengeCoordinator::new(
            Arc::new(Ed25519Verifier),
            Arc::clone(&issuer),
            Arc::clone(&registry),
            args.handshake_timeout(),
        ));

        Ok(Self {
            args,
            issuer,
            coordinator,
            registry,
            started_at: Instant::now(),
        })
    }
}

/// Bind the configured address and serve until the process exits
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;
    serve(listener, state).await
}

/// Serve connections from an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    info!(
        "keyhole listening on {} as node {}",
        listener.local_addr()?,
        state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure default secrets in use");
    }
    if state.args.direct_credentials {
        warn!("Direct credential fetch enabled at /credentials - no proof of key possession");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!(peer = %addr, error = ?err, "Error serving connection");
                    }
                });
            }
            Err(e) => {
                error!(error = ?e, "Error accepting connection");
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!(peer = %addr, method = %method, path = %path, "Request");

    let response = match (method, path.as_str()) {
        (Method::GET, "/ws") | (Method::GET, "/") => {
            if hyper_tungstenite::is_upgrade_request(&req) {
                websocket::handle_upgrade(Arc::clone(&state), req)
            } else {
                bad_request_response("WebSocket upgrade required")
            }
        }

        (Method::GET, "/credentials") | (Method::GET, "/api/userAuth") => {
            if state.args.direct_credentials {
                routes::direct_credentials(Arc::clone(&state)).await
            } else {
                not_found_response(&path)
            }
        }

        (Method::GET, "/health") => routes::health_check(Arc::clone(&state)),

        (Method::OPTIONS, _) => preflight_response(),

        _ => not_found_response(&path),
    };

    Ok(to_boxed(response))
}

/// Convert Full<Bytes> response to BoxBody response
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// JSON response with permissive CORS
pub(crate) fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// JSON error body for a failure
pub(crate) fn error_response(err: KeyholeError) -> Response<Full<Bytes>> {
    let (status, body) = err.into_status_code_and_body();
    json_response(status, body)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, OPTIONS"),
    );
    response
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "Use a WebSocket connection to /ws"
    });
    json_response(StatusCode::NOT_FOUND, body.to_string())
}

/// Bad request response
pub(crate) fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message
    });
    json_response(StatusCode::BAD_REQUEST, body.to_string())
}

/// Service unavailable response
pub(crate) fn unavailable_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Service Unavailable",
        "message": message
    });
    json_response(StatusCode::SERVICE_UNAVAILABLE, body.to_string())
}
