//! Static description of one prediction service.
//!
//! Each row of the endpoint table names how to build the request and where
//! to find the prediction in the response. Nothing here is inferred from
//! what a service actually returns.

use crate::error::EndpointError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// HTTP verb used to call the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Which single payload the endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// `{"scenario": <text>}`
    #[default]
    Scenario,
    /// `{"start_time": "YYYY-MM-DD"}`
    StartDate,
    /// `{"text": <text>}`
    Text,
    /// No payload at all.
    None,
}

/// How the payload is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    #[default]
    Json,
    Form,
    /// Payload fields become URL query parameters.
    Query,
}

/// Where the prediction lives in the response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResponseShape {
    /// A number or string at a dotted path (empty path = body root).
    Prediction { field: String },
    /// A serialized chart specification (a JSON string) at a dotted path.
    Graph {
        #[serde(default)]
        field: String,
    },
}

impl ResponseShape {
    pub fn field(&self) -> &str {
        match self {
            ResponseShape::Prediction { field } | ResponseShape::Graph { field } => field,
        }
    }
}

/// Date format sent in `start_time`.
pub const START_DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of the endpoint table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Unique key; also the key in the aggregate result.
    pub key: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Grouping used in reports (climate, economic, ...).
    #[serde(default = "default_category")]
    pub category: String,

    /// Display unit for scalar predictions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Service base URL. May be absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable that supplies `base_url` at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,

    /// Route appended to the base URL. Defaults to the key; empty means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default)]
    pub request: RequestKind,

    #[serde(default)]
    pub encoding: BodyEncoding,

    pub response: ResponseShape,
}

fn default_category() -> String {
    "other".to_string()
}

/// Payload of an outbound request, already encoded per the descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Json(Value),
    Form(Vec<(String, String)>),
    Query(Vec<(String, String)>),
}

/// A fully built request, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub method: HttpMethod,
    pub payload: Payload,
}

impl EndpointDescriptor {
    /// Creates a descriptor with default name, category, method and encoding.
    pub fn new(key: impl Into<String>, request: RequestKind, response: ResponseShape) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            category: default_category(),
            unit: None,
            base_url: None,
            url_env: None,
            path: None,
            method: HttpMethod::Post,
            request,
            encoding: BodyEncoding::Json,
            response,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Display name, falling back to the key.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.key
        } else {
            &self.name
        }
    }

    /// Route appended to the base URL.
    pub fn route(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.key)
    }

    /// Full URL, if a base URL is configured.
    pub fn url(&self) -> Option<String> {
        let base = self.base_url.as_deref()?.trim();
        if base.is_empty() {
            return None;
        }

        let route = self.route().trim_start_matches('/');
        if route.is_empty() {
            Some(base.to_string())
        } else {
            Some(format!("{}/{}", base.trim_end_matches('/'), route))
        }
    }

    /// The payload fields this endpoint expects, before encoding.
    fn fields(&self, scenario: &str, start_date: NaiveDate) -> Vec<(String, String)> {
        match self.request {
            RequestKind::Scenario => vec![("scenario".to_string(), scenario.to_string())],
            RequestKind::StartDate => vec![(
                "start_time".to_string(),
                start_date.format(START_DATE_FORMAT).to_string(),
            )],
            RequestKind::Text => vec![("text".to_string(), scenario.to_string())],
            RequestKind::None => Vec::new(),
        }
    }

    /// Builds the outbound request for one scenario.
    pub fn build_request(
        &self,
        scenario: &str,
        start_date: NaiveDate,
    ) -> Result<OutboundRequest, EndpointError> {
        let url = self.url().ok_or(EndpointError::MissingBaseUrl)?;
        let fields = self.fields(scenario, start_date);

        let payload = if fields.is_empty() {
            Payload::None
        } else {
            match self.encoding {
                BodyEncoding::Json => {
                    let body: serde_json::Map<String, Value> =
                        fields.into_iter().map(|(k, v)| (k, json!(v))).collect();
                    Payload::Json(Value::Object(body))
                }
                BodyEncoding::Form => Payload::Form(fields),
                BodyEncoding::Query => Payload::Query(fields),
            }
        };

        Ok(OutboundRequest {
            url,
            method: self.method,
            payload,
        })
    }

    /// One-line description of the request shape, used by `--dry-run`.
    pub fn describe_request(&self) -> String {
        let body = match self.request {
            RequestKind::Scenario => "{scenario}",
            RequestKind::StartDate => "{start_time}",
            RequestKind::Text => "{text}",
            RequestKind::None => "no body",
        };
        let encoding = match (self.request, self.encoding) {
            (RequestKind::None, _) => "",
            (_, BodyEncoding::Json) => " as JSON",
            (_, BodyEncoding::Form) => " as form",
            (_, BodyEncoding::Query) => " as query",
        };
        format!("{} {}{}", self.method, body, encoding)
    }
}
