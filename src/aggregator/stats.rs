//! Result grouping and statistics.
//!
//! This module provides utilities for summarizing an aggregate result
//! against the endpoint table that produced it.

use crate::endpoint::EndpointDescriptor;
use crate::models::{AggregateResult, AggregateSummary, PredictionResult};
use std::collections::HashMap;

/// Compute summary statistics for one aggregation.
pub fn summarize(result: &AggregateResult, endpoints: &[EndpointDescriptor]) -> AggregateSummary {
    let mut summary = AggregateSummary {
        total: result.results.len(),
        ..Default::default()
    };

    for (key, entry) in &result.results {
        match entry {
            PredictionResult::Prediction { .. } => summary.predictions += 1,
            PredictionResult::Graph { .. } => summary.graphs += 1,
            PredictionResult::Unavailable { .. } => summary.unavailable += 1,
        }

        if entry.is_available() {
            let category = category_of(key, endpoints);
            *summary.by_category.entry(category.to_string()).or_insert(0) += 1;
        }
    }

    summary.total_attempts = result.diagnostics.values().map(|d| d.attempts).sum();
    summary
}

fn category_of<'a>(key: &str, endpoints: &'a [EndpointDescriptor]) -> &'a str {
    endpoints
        .iter()
        .find(|e| e.key == key)
        .map(|e| e.category.as_str())
        .unwrap_or("other")
}

/// Keys and error messages of endpoints that ended unavailable, sorted by key.
pub fn unavailable_endpoints(result: &AggregateResult) -> Vec<(&str, &str)> {
    result
        .results
        .iter()
        .filter_map(|(key, entry)| match entry {
            PredictionResult::Unavailable { error, .. } => Some((key.as_str(), error.as_str())),
            _ => None,
        })
        .collect()
}

/// Group endpoint keys by category, in table order within each group.
pub fn group_by_category(endpoints: &[EndpointDescriptor]) -> HashMap<String, Vec<String>> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for endpoint in endpoints {
        grouped
            .entry(endpoint.category.clone())
            .or_default()
            .push(endpoint.key.clone());
    }

    grouped
}

/// Generate a text summary of the aggregation.
pub fn generate_summary_text(summary: &AggregateSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Endpoints queried: {}", summary.total));
    lines.push(format!("- ✅ Predictions: {}", summary.predictions));
    lines.push(format!("- 📈 Graphs: {}", summary.graphs));
    lines.push(format!("- ⚠️ Unavailable: {}", summary.unavailable));
    lines.push(format!("- Attempts: {}", summary.total_attempts));

    if !summary.by_category.is_empty() {
        lines.push(String::new());
        lines.push("By Category:".to_string());

        let mut categories: Vec<_> = summary.by_category.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (category, count) in categories {
            lines.push(format!("- {}: {}", category, count));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{RequestKind, ResponseShape};
    use crate::models::{EndpointDiagnostics, PredictionValue};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn endpoint(key: &str, category: &str) -> EndpointDescriptor {
        let mut e = EndpointDescriptor::new(
            key,
            RequestKind::Scenario,
            ResponseShape::Prediction {
                field: "v".into(),
            },
        );
        e.category = category.to_string();
        e
    }

    fn create_test_result() -> AggregateResult {
        let mut results = BTreeMap::new();
        results.insert(
            "temp".to_string(),
            PredictionResult::Prediction {
                value: PredictionValue::Number(31.0),
            },
        );
        results.insert(
            "trend".to_string(),
            PredictionResult::Graph {
                value: json!({"data": []}),
            },
        );
        results.insert(
            "crop".to_string(),
            PredictionResult::unavailable("HTTP 500: ", 5),
        );

        let mut diagnostics = BTreeMap::new();
        for (key, attempts) in [("temp", 1), ("trend", 2), ("crop", 5)] {
            diagnostics.insert(
                key.to_string(),
                EndpointDiagnostics {
                    attempts,
                    elapsed_ms: 10,
                },
            );
        }

        AggregateResult {
            scenario: "test".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            generated_at: Utc::now(),
            duration_seconds: 1.0,
            results,
            diagnostics,
        }
    }

    fn table() -> Vec<EndpointDescriptor> {
        vec![
            endpoint("temp", "climate"),
            endpoint("trend", "climate"),
            endpoint("crop", "agriculture"),
        ]
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&create_test_result(), &table());

        assert_eq!(summary.total, 3);
        assert_eq!(summary.predictions, 1);
        assert_eq!(summary.graphs, 1);
        assert_eq!(summary.unavailable, 1);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.total_attempts, 8);
        assert_eq!(summary.by_category.get("climate"), Some(&2));
        assert_eq!(summary.by_category.get("agriculture"), None);
    }

    #[test]
    fn test_unavailable_endpoints() {
        let result = create_test_result();
        assert_eq!(unavailable_endpoints(&result), vec![("crop", "HTTP 500: ")]);
    }

    #[test]
    fn test_group_by_category() {
        let grouped = group_by_category(&table());
        assert_eq!(
            grouped.get("climate"),
            Some(&vec!["temp".to_string(), "trend".to_string()])
        );
        assert_eq!(grouped.get("agriculture").map(|v| v.len()), Some(1));
    }

    #[test]
    fn test_summary_text() {
        let summary = summarize(&create_test_result(), &table());
        let text = generate_summary_text(&summary);

        assert!(text.contains("Endpoints queried: 3"));
        assert!(text.contains("Unavailable: 1"));
        assert!(text.contains("- climate: 2"));
    }
}
