//! Base64 JSON tunnel adapter (spec §6, §8 round-trip laws): the
//! serverless-style surface that carries the same binary `Request`/
//! `Response` payload as a base64 string wrapped in JSON double quotes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TunnelError {
    #[error("tunnel payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("tunnel payload is missing its outer JSON quotes")]
    MissingQuotes,
    #[error("tunnel payload is not a valid JSON string")]
    InvalidJson,
    #[error("tunnel payload is not valid padded base64")]
    InvalidBase64,
}

/// Encodes `payload` (an already wire-encoded `Request`/`Response`) as a
/// base64 string wrapped in mandatory JSON quotes.
pub fn encode(payload: &[u8]) -> String {
    let encoded = BASE64.encode(payload);
    serde_json::to_string(&encoded).expect("base64 text always serializes as a JSON string")
}

/// Decodes a tunneled body back into the wire-encoded bytes it carries.
/// Rejects payloads missing the outer quotes or carrying non-base64
/// content as a bad request rather than panicking (spec §8).
pub fn decode(body: &[u8]) -> Result<Vec<u8>, TunnelError> {
    let text = std::str::from_utf8(body).map_err(|_| TunnelError::InvalidUtf8)?;
    let trimmed = text.trim();
    if !trimmed.starts_with('"') || !trimmed.ends_with('"') || trimmed.len() < 2 {
        return Err(TunnelError::MissingQuotes);
    }
    let inner: String =
        serde_json::from_str(trimmed).map_err(|_| TunnelError::InvalidJson)?;
    BASE64.decode(inner).map_err(|_| TunnelError::InvalidBase64)
}
