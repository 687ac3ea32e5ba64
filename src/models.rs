//! Data models for the prediction aggregator.
//!
//! This module contains the request and result types that flow through
//! the aggregator, the report generator and the HTTP API.

use crate::error::AggregateError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A user-supplied what-if scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRequest {
    scenario: String,
    start_date: Option<NaiveDate>,
}

impl ScenarioRequest {
    /// Creates a request, rejecting blank scenarios.
    pub fn new(scenario: impl Into<String>) -> Result<Self, AggregateError> {
        let scenario = scenario.into();
        if scenario.trim().is_empty() {
            return Err(AggregateError::EmptyScenario);
        }

        Ok(Self {
            scenario,
            start_date: None,
        })
    }

    /// Overrides the start date sent to time-series endpoints.
    pub fn with_start_date(mut self, date: Option<NaiveDate>) -> Self {
        self.start_date = date;
        self
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }
}

/// A scalar prediction returned by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for PredictionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionValue::Number(n) => write!(f, "{:.2}", n),
            PredictionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Result of querying one endpoint.
///
/// `Unavailable` is the failure sentinel. It carries its own `type` tag so a
/// caller can never confuse it with a legitimate zero or empty prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PredictionResult {
    /// A scalar prediction.
    Prediction { value: PredictionValue },
    /// A chart specification, already parsed into structured JSON.
    Graph { value: Value },
    /// The endpoint failed permanently or exhausted its retries.
    Unavailable { error: String, attempts: u32 },
}

impl PredictionResult {
    pub fn unavailable(error: impl fmt::Display, attempts: u32) -> Self {
        PredictionResult::Unavailable {
            error: error.to_string(),
            attempts,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, PredictionResult::Unavailable { .. })
    }

    /// Short status label used in reports.
    pub fn status(&self) -> &'static str {
        match self {
            PredictionResult::Prediction { .. } => "prediction",
            PredictionResult::Graph { .. } => "graph",
            PredictionResult::Unavailable { .. } => "unavailable",
        }
    }

    /// Returns the scalar value if this is a prediction.
    pub fn prediction(&self) -> Option<&PredictionValue> {
        match self {
            PredictionResult::Prediction { value } => Some(value),
            _ => None,
        }
    }
}

/// Per-endpoint bookkeeping kept alongside the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDiagnostics {
    /// Number of attempts made (0 if the endpoint was never called).
    pub attempts: u32,
    /// Wall-clock time spent on the endpoint, retries included.
    pub elapsed_ms: u64,
}

/// Results of one aggregation, keyed by endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    /// The scenario that seeded every request.
    pub scenario: String,
    /// Date sent to time-series endpoints.
    pub start_date: NaiveDate,
    /// When the aggregation finished.
    pub generated_at: DateTime<Utc>,
    /// Total duration of the aggregation in seconds.
    pub duration_seconds: f64,
    /// One entry per configured endpoint key.
    pub results: BTreeMap<String, PredictionResult>,
    /// Attempt counts and timings per endpoint key.
    pub diagnostics: BTreeMap<String, EndpointDiagnostics>,
}

impl AggregateResult {
    pub fn get(&self, key: &str) -> Option<&PredictionResult> {
        self.results.get(key)
    }

    /// Number of endpoints that produced data.
    pub fn available_count(&self) -> usize {
        self.results.values().filter(|r| r.is_available()).count()
    }

    /// Number of endpoints that ended in the sentinel.
    pub fn unavailable_count(&self) -> usize {
        self.results.len() - self.available_count()
    }

    pub fn is_partial(&self) -> bool {
        self.unavailable_count() > 0
    }
}

/// Summary of an aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateSummary {
    /// Total number of endpoints queried.
    pub total: usize,
    /// Endpoints that returned a scalar prediction.
    pub predictions: usize,
    /// Endpoints that returned a chart.
    pub graphs: usize,
    /// Endpoints that ended unavailable.
    pub unavailable: usize,
    /// Total attempts across all endpoints.
    pub total_attempts: u32,
    /// Available endpoints per category.
    pub by_category: std::collections::HashMap<String, usize>,
}

impl AggregateSummary {
    pub fn succeeded(&self) -> usize {
        self.predictions + self.graphs
    }
}

/// Metadata about a rendered report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub scenario: String,
    pub start_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub endpoints_queried: usize,
    pub endpoints_unavailable: usize,
    pub duration_seconds: f64,
}

/// One row of a rendered report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub key: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub result: PredictionResult,
    pub attempts: u32,
}

/// A complete what-if report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: AggregateSummary,
    pub entries: Vec<ReportEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_scenario_rejected() {
        assert!(matches!(
            ScenarioRequest::new(""),
            Err(AggregateError::EmptyScenario)
        ));
        assert!(matches!(
            ScenarioRequest::new("   \n"),
            Err(AggregateError::EmptyScenario)
        ));
        assert!(ScenarioRequest::new("What if sea levels rise 2m?").is_ok());
    }

    #[test]
    fn test_prediction_result_wire_format() {
        let number = PredictionResult::Prediction {
            value: PredictionValue::Number(42.5),
        };
        assert_eq!(
            serde_json::to_value(&number).unwrap(),
            json!({"type": "prediction", "value": 42.5})
        );

        let text = PredictionResult::Prediction {
            value: PredictionValue::Text("seawalls".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            json!({"type": "prediction", "value": "seawalls"})
        );

        let graph = PredictionResult::Graph {
            value: json!({"data": []}),
        };
        assert_eq!(
            serde_json::to_value(&graph).unwrap(),
            json!({"type": "graph", "value": {"data": []}})
        );
    }

    #[test]
    fn test_sentinel_distinct_from_zero_and_empty() {
        let sentinel = PredictionResult::unavailable("HTTP 500", 5);
        let zero = PredictionResult::Prediction {
            value: PredictionValue::Number(0.0),
        };
        let empty = PredictionResult::Prediction {
            value: PredictionValue::Text(String::new()),
        };

        assert_ne!(sentinel, zero);
        assert_ne!(sentinel, empty);
        assert!(!sentinel.is_available());
        assert!(zero.is_available());
        assert!(empty.is_available());

        let wire = serde_json::to_value(&sentinel).unwrap();
        assert_eq!(wire["type"], "unavailable");
        assert_eq!(wire["attempts"], 5);
    }

    #[test]
    fn test_prediction_value_display() {
        assert_eq!(PredictionValue::Number(3.14159).to_string(), "3.14");
        assert_eq!(PredictionValue::Text("dikes".into()).to_string(), "dikes");
    }
}
