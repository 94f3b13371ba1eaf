//! HTTP endpoint (spec §6 "Wire protocol"): exposes the function registry
//! as a single `Run(Request) -> Response` method over two transports —
//! the canonical binary form directly, and the base64 JSON tunnel for
//! serverless-style adapters — behind an optional signature-verification
//! middleware (spec §4.6).

pub mod config;
pub mod errors;
pub mod signing;
pub mod tunnel;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use dispatch_runtime::Registry;
use tracing::{info, warn};

pub use config::EndpointConfig;
pub use errors::EndpointError;
pub use signing::{RequestSigner, RequestVerifier, SigningError};
pub use tunnel::TunnelError;

/// Path the canonical binary `Run` method is mounted under, mirroring the
/// gRPC-style fully-qualified method name the platform addresses.
pub const RUN_PATH: &str = "/dispatch.sdk.v1.FunctionService/Run";
/// Path the base64 JSON tunnel adapter is mounted under (spec §6).
pub const RUN_TUNNEL_PATH: &str = "/dispatch.sdk.v1.FunctionService/Run/tunnel";

struct EndpointState {
    registry: Arc<Registry>,
    verifier: RequestVerifier,
}

/// The HTTP surface a host process mounts a [`Registry`] behind. Owns the
/// registry and the optional signature verifier for the process lifetime
/// (spec §5 "Resource acquisition").
#[derive(Clone)]
pub struct Endpoint {
    state: Arc<EndpointState>,
}

impl Endpoint {
    pub fn new(registry: Arc<Registry>, verifier: RequestVerifier) -> Self {
        if !verifier.is_enabled() {
            warn!("no DISPATCH_VERIFICATION_KEY configured; accepting all inbound requests unsigned");
        }
        Self {
            state: Arc::new(EndpointState { registry, verifier }),
        }
    }

    /// Builds an endpoint from `DISPATCH_VERIFICATION_KEY` (spec §6). A
    /// malformed key is rejected here, at construction time; a missing
    /// key only produces a logged warning, not an error.
    pub fn from_env(registry: Arc<Registry>) -> Result<Self, SigningError> {
        let config = EndpointConfig::from_env();
        let verifier = match config.verification_key {
            Some(key) => RequestVerifier::from_base64(&key)?,
            None => RequestVerifier::disabled(),
        };
        Ok(Self::new(registry, verifier))
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(RUN_PATH, post(run_binary))
            .route(RUN_TUNNEL_PATH, post(run_tunnel))
            .with_state(self.state.clone())
    }

    /// Binds `addr` and serves until the process is terminated.
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "dispatch endpoint listening");
        axum::serve(listener, self.router()).await
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(OCTET_STREAM)
        .to_owned()
}

fn signature_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(signing::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
}

async fn verify(
    state: &EndpointState,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), EndpointError> {
    let ct = content_type(headers);
    state
        .verifier
        .verify("POST", path, &ct, body, signature_header(headers))
        .map_err(EndpointError::from)
}

async fn run_binary(
    State(state): State<Arc<EndpointState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    match handle_run(&state, RUN_PATH, &headers, &body, false).await {
        Ok(bytes) => (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, OCTET_STREAM)], bytes)
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn run_tunnel(
    State(state): State<Arc<EndpointState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    match handle_run(&state, RUN_TUNNEL_PATH, &headers, &body, true).await {
        Ok(bytes) => (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "application/json")], bytes)
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_run(
    state: &EndpointState,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
    tunneled: bool,
) -> Result<Vec<u8>, EndpointError> {
    verify(state, path, headers, body).await?;

    let wire_bytes = if tunneled {
        tunnel::decode(body)?
    } else {
        body.to_vec()
    };
    let request = dispatch_proto::decode_request(&wire_bytes)?;
    let response = state.registry.run(request).await;
    let encoded = dispatch_proto::encode_response(&response)?;

    Ok(if tunneled {
        tunnel::encode(&encoded).into_bytes()
    } else {
        encoded
    })
}

#[cfg(test)]
mod tests;
