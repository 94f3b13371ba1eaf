use thiserror::Error;

use crate::config::ApiKeySource;

/// Outbound submission failures (spec §4.7, §6). A missing API key is
/// fatal only the first time a call is actually dispatched, never at
/// client construction time.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no DISPATCH_API_KEY configured and no API key was provided to the client")]
    MissingApiKey,

    #[error("dispatch endpoint rejected the request: invalid api key {redacted_key} ({source:?})")]
    Unauthenticated {
        redacted_key: String,
        source: ApiKeySource,
    },

    #[error("dispatch batch was empty")]
    EmptyBatch,

    #[error("transport error talking to the dispatch API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("dispatch API returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Redacts `key` to its first three characters plus an elision marker,
/// matching spec §4.7's diagnostic shape exactly.
pub fn redact_api_key(key: &str) -> String {
    let visible: String = key.chars().take(3).collect();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn redacts_all_but_first_three_characters() {
        assert_eq!(redact_api_key("sk_live_abcdef"), "sk_***");
    }

    #[test]
    fn redacts_short_keys_without_panicking() {
        assert_eq!(redact_api_key("ab"), "ab***");
    }
}
