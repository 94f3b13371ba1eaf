//! The `coroutine_state` envelope (spec §4.3): a fixed, mode-specific type
//! URL wrapping the opaque continuation payload, so that state produced by
//! one mode is never silently accepted by the other.

use serde::{Deserialize, Serialize};

use crate::errors::RuntimeError;

pub const VOLATILE_STATE_TYPE_URL: &str = "dispatch.coroutine.v1.volatile-handle";
pub const DURABLE_STATE_TYPE_URL: &str = "dispatch.coroutine.v1.durable-journal";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
struct StateEnvelope {
    type_url: String,
    payload: Vec<u8>,
}

/// Allocation: one `Vec<u8>` for the bincode buffer. Complexity: O(n).
pub fn wrap(type_url: &str, payload: Vec<u8>) -> Vec<u8> {
    let envelope = StateEnvelope {
        type_url: type_url.to_owned(),
        payload,
    };
    bincode::serialize(&envelope).expect("state envelope always serializes")
}

/// Unwraps `bytes` and checks its type URL matches `expected_type_url`.
pub fn unwrap(bytes: &[u8], expected_type_url: &str) -> Result<Vec<u8>, RuntimeError> {
    let envelope: StateEnvelope = bincode::deserialize(bytes)
        .map_err(|err| RuntimeError::MalformedState(err.to_string()))?;
    if envelope.type_url != expected_type_url {
        return Err(RuntimeError::IncompatibleState {
            found: envelope.type_url,
            expected: expected_type_url.to_owned(),
        });
    }
    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_matching_type_url() {
        let bytes = wrap(VOLATILE_STATE_TYPE_URL, vec![1, 2, 3]);
        let payload = unwrap(&bytes, VOLATILE_STATE_TYPE_URL).unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
    }

    #[test]
    fn mismatched_type_url_is_incompatible_state() {
        let bytes = wrap(VOLATILE_STATE_TYPE_URL, vec![1]);
        let err = unwrap(&bytes, DURABLE_STATE_TYPE_URL).unwrap_err();
        assert!(matches!(err, RuntimeError::IncompatibleState { .. }));
    }
}
