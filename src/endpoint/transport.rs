//! Outbound HTTP transport.
//!
//! The aggregator talks to prediction services only through the
//! [`Transport`] trait so tests can substitute scripted fakes.

use crate::endpoint::descriptor::{HttpMethod, OutboundRequest, Payload};
use crate::error::EndpointError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Longest upstream error body kept, in characters.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

/// Sends one request and returns the decoded JSON body of a 2xx response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<Value, EndpointError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whatif/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, timeout })
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> EndpointError {
        if e.is_builder() {
            EndpointError::InvalidRequest(e.to_string())
        } else if e.is_timeout() {
            EndpointError::Timeout(self.timeout)
        } else if e.is_connect() {
            EndpointError::Connect {
                url: url.to_string(),
            }
        } else {
            EndpointError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<Value, EndpointError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        }
        .header(reqwest::header::ACCEPT, "application/json");

        let builder = match &request.payload {
            Payload::None => builder,
            Payload::Json(body) => builder.json(body),
            Payload::Form(fields) => builder.form(fields),
            Payload::Query(fields) => builder.query(fields),
        };

        debug!("{} {}", request.method, request.url);

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_send_error(&request.url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(&request.url, e))?;

        serde_json::from_slice(&bytes).map_err(|e| EndpointError::Decode(e.to_string()))
    }
}

/// Caps an upstream body at [`MAX_ERROR_BODY_CHARS`], marking the cut with `…`.
fn truncate_body(body: String) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body,
    }
}
