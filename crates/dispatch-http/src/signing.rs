//! Request signing and verification (spec §6 "Request signing").
//!
//! The canonical representation the signature is computed over is this
//! repository's concrete choice for spec.md's otherwise-abstract
//! "canonical HTTP representation" (see `DESIGN.md`): the HTTP method,
//! the request path, the `Content-Type` header, and a SHA-256 digest of
//! the body, newline-joined. The signature itself is an Ed25519
//! signature over those bytes, base64-encoded into the
//! `Dispatch-Signature` header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "dispatch-signature";

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("malformed signing key: {0}")]
    MalformedKey(String),
    #[error("request carries no {SIGNATURE_HEADER} header")]
    MissingSignature,
    #[error("request signature does not validate against the configured public key")]
    InvalidSignature,
}

/// Builds the exact byte sequence a signature is computed over. Shared by
/// [`RequestSigner::sign`] and [`RequestVerifier::verify`] so the two
/// sides can never silently drift apart.
pub fn canonical_representation(method: &str, path: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(body);
    let mut buf = Vec::with_capacity(method.len() + path.len() + content_type.len() + digest.len() + 3);
    buf.extend_from_slice(method.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(path.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(content_type.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(&digest);
    buf
}

/// Signs outbound test/client requests with the private half of the
/// asymmetric key pair (spec §6: "the private key to any test client").
pub struct RequestSigner {
    signing_key: SigningKey,
}

impl RequestSigner {
    pub fn from_base64(encoded: &str) -> Result<Self, SigningError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| SigningError::MalformedKey(err.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SigningError::MalformedKey("signing key must be 32 bytes".to_owned()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    pub fn sign(&self, method: &str, path: &str, content_type: &str, body: &[u8]) -> String {
        let message = canonical_representation(method, path, content_type, body);
        let signature: Signature = self.signing_key.sign(&message);
        BASE64.encode(signature.to_bytes())
    }
}

/// Verifies inbound requests against the configured public key (spec §6,
/// §8 "Signature verification"). A verifier with no key configured
/// accepts everything — the endpoint logs a warning instead at
/// construction time.
pub struct RequestVerifier {
    verifying_key: Option<VerifyingKey>,
}

impl RequestVerifier {
    pub fn new(verifying_key: Option<VerifyingKey>) -> Self {
        Self { verifying_key }
    }

    pub fn disabled() -> Self {
        Self { verifying_key: None }
    }

    /// Parses a base64-encoded Ed25519 public key. Malformed keys are
    /// rejected here, at configuration time, never at request time (spec
    /// §6).
    pub fn from_base64(encoded: &str) -> Result<Self, SigningError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| SigningError::MalformedKey(err.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            SigningError::MalformedKey("verification key must be 32 bytes".to_owned())
        })?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|err| SigningError::MalformedKey(err.to_string()))?;
        Ok(Self::new(Some(verifying_key)))
    }

    pub fn is_enabled(&self) -> bool {
        self.verifying_key.is_some()
    }

    pub fn verify(
        &self,
        method: &str,
        path: &str,
        content_type: &str,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), SigningError> {
        let Some(verifying_key) = self.verifying_key.as_ref() else {
            return Ok(());
        };
        let signature_b64 = signature_header.ok_or(SigningError::MissingSignature)?;
        let signature_bytes = BASE64
            .decode(signature_b64)
            .map_err(|_| SigningError::InvalidSignature)?;
        let signature_bytes: [u8; 64] = signature_bytes
            .try_into()
            .map_err(|_| SigningError::InvalidSignature)?;
        let signature = Signature::from_bytes(&signature_bytes);
        let message = canonical_representation(method, path, content_type, body);
        verifying_key
            .verify(&message, &signature)
            .map_err(|_| SigningError::InvalidSignature)
    }
}
