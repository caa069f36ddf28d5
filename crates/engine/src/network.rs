//! Network collaborator
//!
//! The cache never talks to a transport itself. A [`Network`] turns request
//! parameters, variables and a cache config into an [`Observable`] of
//! responses; retries, polling and deduplication are its business.

use serde::{Deserialize, Serialize};

use strata_core::{CacheConfig, RequestParameters, StrataError, StrataResult, Variables};

use crate::normalizer::PayloadData;
use crate::observable::Observable;

/// One error entry of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadError {
    /// Human-readable message
    pub message: String,
    /// Response path the error applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<serde_json::Value>>,
}

/// One response payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    /// Response data, if any
    #[serde(default)]
    pub data: Option<PayloadData>,
    /// Errors reported alongside (or instead of) data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PayloadError>,
}

impl GraphQLResponse {
    /// Response carrying `data` and no errors
    ///
    /// # Errors
    ///
    /// `InvalidPayload` if `data` is not a JSON object.
    pub fn from_data(data: serde_json::Value) -> StrataResult<Self> {
        match data {
            serde_json::Value::Object(map) => Ok(Self {
                data: Some(map),
                errors: Vec::new(),
            }),
            other => Err(StrataError::invalid_payload(format!(
                "response data must be an object, got {}",
                other
            ))),
        }
    }

    /// Parse a full `{"data": .., "errors": ..}` response body
    pub fn from_json_str(body: &str) -> StrataResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| StrataError::invalid_payload(format!("Failed to parse response: {}", e)))
    }

    /// Joined error messages, if any
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Executes requests on behalf of the environment
pub trait Network: Send + Sync {
    /// Start a request; nothing happens until the result is subscribed
    fn execute(
        &self,
        request: &RequestParameters,
        variables: &Variables,
        cache_config: &CacheConfig,
    ) -> Observable<GraphQLResponse>;
}

impl<F> Network for F
where
    F: Fn(&RequestParameters, &Variables, &CacheConfig) -> Observable<GraphQLResponse> + Send + Sync,
{
    fn execute(
        &self,
        request: &RequestParameters,
        variables: &Variables,
        cache_config: &CacheConfig,
    ) -> Observable<GraphQLResponse> {
        self(request, variables, cache_config)
    }
}

/// Network that fails every request
///
/// For environments fed only through `commit_payload` and local updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNetwork;

impl Network for OfflineNetwork {
    fn execute(
        &self,
        request: &RequestParameters,
        _variables: &Variables,
        _cache_config: &CacheConfig,
    ) -> Observable<GraphQLResponse> {
        Observable::from_error(StrataError::network(format!(
            "no network configured for '{}'",
            request.name
        )))
    }
}
