//! Error types for the aggregator.

use crate::retry::Retryable;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single endpoint call.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// No base URL was configured for the endpoint.
    #[error("no base URL configured")]
    MissingBaseUrl,

    /// The attempt did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The service could not be reached.
    #[error("cannot connect to {url}")]
    Connect { url: String },

    /// The request could not be built, e.g. a malformed URL.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport-level failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body of a 2xx response was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(String),

    /// The declared response field is absent or null.
    #[error("field `{0}` missing from response")]
    MissingField(String),

    /// The declared response field has the wrong type.
    #[error("field `{field}` has unexpected type (expected {expected})")]
    UnexpectedType {
        field: String,
        expected: &'static str,
    },

    /// The embedded chart string could not be parsed.
    #[error("chart at `{field}` is not valid JSON: {reason}")]
    InvalidChart { field: String, reason: String },
}

impl Retryable for EndpointError {
    /// Network failures and non-2xx statuses are transient; everything else
    /// is a shape mismatch or misconfiguration and will not improve on retry.
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            EndpointError::Timeout(_)
                | EndpointError::Connect { .. }
                | EndpointError::Request(_)
                | EndpointError::Status { .. }
        )
    }
}

/// Top-level aggregation errors.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("scenario must not be empty")]
    EmptyScenario,

    #[error("no prediction endpoints configured")]
    NoEndpoints,

    #[error("endpoint key must not be empty")]
    EmptyKey,

    #[error("duplicate endpoint key: {0}")]
    DuplicateEndpoint(String),

    /// Every endpoint ended unavailable. Maps key to error message.
    #[error("all {} prediction endpoints failed", .0.len())]
    AllEndpointsFailed(BTreeMap<String, String>),
}
