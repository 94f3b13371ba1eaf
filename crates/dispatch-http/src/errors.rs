use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as AxumResponse};
use thiserror::Error;

use crate::signing::SigningError;
use crate::tunnel::TunnelError;

/// Endpoint-level failures (spec §6, §7): signature verification and
/// transport-shaped errors that never reach the function registry at
/// all. Anything that gets as far as the registry is instead folded
/// into a [`dispatch_proto::Response`]'s own status.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error("failed to decode request payload: {0}")]
    Protocol(#[from] dispatch_proto::ProtocolError),
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> AxumResponse {
        let status = match &self {
            EndpointError::Signing(SigningError::MissingSignature)
            | EndpointError::Signing(SigningError::InvalidSignature) => StatusCode::FORBIDDEN,
            EndpointError::Signing(SigningError::MalformedKey(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            EndpointError::Tunnel(_) | EndpointError::Protocol(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}
