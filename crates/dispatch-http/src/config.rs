//! Endpoint-side configuration (spec §6 "Configuration inputs"):
//! `DISPATCH_VERIFICATION_KEY` and `DISPATCH_ENDPOINT_URL`, layered the
//! same way `dispatch-client`'s config is.

use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointConfig {
    pub verification_key: Option<String>,
    pub endpoint_url: Option<String>,
}

impl EndpointConfig {
    pub fn from_env() -> Self {
        Figment::new()
            .merge(Env::prefixed("DISPATCH_"))
            .extract()
            .unwrap_or_default()
    }

    pub fn with_verification_key(mut self, key: impl Into<String>) -> Self {
        self.verification_key = Some(key.into());
        self
    }
}
