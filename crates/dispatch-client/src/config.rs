//! Environment-driven configuration for the outbound client (spec §6
//! "Configuration inputs"). `figment` layers `DISPATCH_*` environment
//! variables over explicit code-provided overrides, the same shape
//! `golem-service-base`'s `CloudServiceConfig` builds its config from.

use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.dispatch.run";

/// Construction-time configuration failures (spec §6, §2.3). Unlike
/// [`crate::ClientError`], which covers failures dispatching a batch,
/// these prevent a [`crate::Client`] from ever being built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DISPATCH_ENDPOINT_URL is not set; a client cannot be built without it")]
    MissingEndpointUrl,
    #[error("failed to read configuration: {0}")]
    Figment(#[from] figment::Error),
}

/// Where an API key value came from, so [`crate::ClientError::Unauthenticated`]
/// can report it alongside the redacted key (spec §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiKeySource {
    Config,
    Environment,
}

/// Mirrors the `DISPATCH_*` table in spec §6. Every field may also be set
/// in code via the `with_*` builders, which take priority over the
/// environment.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    pub endpoint_url: Option<String>,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    #[serde(skip)]
    api_key_from_config: bool,
}

impl ClientConfig {
    /// Loads config from `DISPATCH_*` environment variables. A missing
    /// `DISPATCH_API_KEY` is not an error here, only once an outbound call
    /// is actually attempted (spec §6) — but a missing `DISPATCH_ENDPOINT_URL`
    /// is fatal, raised right here at construction time (spec §2.3).
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Figment::new().merge(Env::prefixed("DISPATCH_")).extract()?;
        config.require_endpoint_url()
    }

    pub(crate) fn require_endpoint_url(self) -> Result<Self, ConfigError> {
        if self.endpoint_url.is_none() {
            return Err(ConfigError::MissingEndpointUrl);
        }
        Ok(self)
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.api_key_from_config = true;
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Whether `api_key` (if any) was set explicitly in code rather than
    /// picked up from `DISPATCH_API_KEY`.
    pub fn api_key_source(&self) -> ApiKeySource {
        if self.api_key_from_config {
            ApiKeySource::Config
        } else {
            ApiKeySource::Environment
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_api_url_is_used_when_unset() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url(), DEFAULT_API_URL);
    }

    #[test]
    fn explicit_api_key_is_tagged_as_config_sourced() {
        let config = ClientConfig::default().with_api_key("secret");
        assert_eq!(config.api_key_source(), ApiKeySource::Config);
    }

    #[test]
    fn env_loaded_key_is_tagged_as_environment_sourced() {
        let config = ClientConfig::default();
        assert_eq!(config.api_key_source(), ApiKeySource::Environment);
    }

    #[test]
    fn missing_endpoint_url_is_rejected() {
        let err = ClientConfig::default().require_endpoint_url().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEndpointUrl));
    }

    #[test]
    fn endpoint_url_present_passes_through() {
        let config = ClientConfig::default()
            .with_endpoint_url("https://my-app/ep")
            .require_endpoint_url()
            .unwrap();
        assert_eq!(config.endpoint_url.as_deref(), Some("https://my-app/ep"));
    }
}
