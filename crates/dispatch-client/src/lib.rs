//! Outbound batch client (spec §4.7): submits batches of [`Call`]s to the
//! platform and surfaces the dispatch IDs it assigns, in the same order
//! the calls were submitted.

mod config;
mod errors;

pub use config::{ApiKeySource, ClientConfig, ConfigError, DEFAULT_API_URL};
pub use errors::{redact_api_key, ClientError};

use dispatch_proto::Call;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Submits batches of [`Call`]s to the platform over HTTP. Cheap to
/// clone: the inner `reqwest::Client` is itself a cheap `Arc` handle.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    api_key_source: ApiKeySource,
    endpoint_url: Option<String>,
}

#[derive(Serialize)]
struct DispatchBatchRequest<'a> {
    calls: &'a [Call],
}

#[derive(Deserialize)]
struct DispatchBatchResponse {
    dispatch_ids: Vec<String>,
}

impl Client {
    /// Fails if `config` carries no `endpoint_url` (spec §2.3): unlike a
    /// missing API key, there is no later point at which this is recoverable.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let config = config.require_endpoint_url()?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url().to_owned(),
            api_key: config.api_key.clone(),
            api_key_source: config.api_key_source(),
            endpoint_url: config.endpoint_url.clone(),
        })
    }

    /// Builds a client from `DISPATCH_*` environment variables (spec §6).
    /// Does not fail on a missing `DISPATCH_API_KEY`; that only surfaces
    /// as an error from [`Client::dispatch`]. A missing `DISPATCH_ENDPOINT_URL`
    /// is fatal, raised here (spec §2.3).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// The default `endpoint` new [`Call`]s should carry when this
    /// process is itself the caller (`DISPATCH_ENDPOINT_URL`).
    pub fn default_endpoint(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    /// Submits `calls` as a single batch, returning assigned dispatch IDs
    /// in the same order as `calls`.
    pub async fn dispatch(&self, calls: Vec<Call>) -> Result<Vec<String>, ClientError> {
        if calls.is_empty() {
            return Err(ClientError::EmptyBatch);
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClientError::MissingApiKey)?;

        debug!(count = calls.len(), url = %self.api_url, "submitting call batch");
        let response = self
            .http
            .post(format!("{}/dispatches", self.api_url))
            .bearer_auth(api_key)
            .json(&DispatchBatchRequest { calls: &calls })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            let redacted_key = redact_api_key(api_key);
            warn!(redacted_key = %redacted_key, source = ?self.api_key_source, "dispatch API rejected credentials");
            return Err(ClientError::Unauthenticated {
                redacted_key,
                source: self.api_key_source,
            });
        }

        let response = response.error_for_status()?;
        let body: DispatchBatchResponse = response
            .json()
            .await
            .map_err(|err| ClientError::MalformedResponse(err.to_string()))?;

        if body.dispatch_ids.len() != calls.len() {
            return Err(ClientError::MalformedResponse(format!(
                "expected {} dispatch ids, got {}",
                calls.len(),
                body.dispatch_ids.len()
            )));
        }
        Ok(body.dispatch_ids)
    }
}
