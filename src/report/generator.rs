//! Markdown and JSON report generation.
//!
//! This module turns an aggregate result and the endpoint table that
//! produced it into a human-readable or machine-readable report.

use crate::aggregator::{generate_summary_text, summarize};
use crate::endpoint::EndpointDescriptor;
use crate::models::{
    AggregateResult, AggregateSummary, PredictionResult, Report, ReportEntry, ReportMetadata,
};
use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Build a report, with entries in endpoint-table order.
pub fn build_report(result: &AggregateResult, endpoints: &[EndpointDescriptor]) -> Report {
    let summary = summarize(result, endpoints);

    let entries = endpoints
        .iter()
        .filter_map(|endpoint| {
            let entry = result.results.get(&endpoint.key)?;
            Some(ReportEntry {
                key: endpoint.key.clone(),
                name: endpoint.display_name().to_string(),
                category: endpoint.category.clone(),
                unit: endpoint.unit.clone(),
                result: entry.clone(),
                attempts: result
                    .diagnostics
                    .get(&endpoint.key)
                    .map(|d| d.attempts)
                    .unwrap_or(0),
            })
        })
        .collect();

    Report {
        metadata: ReportMetadata {
            scenario: result.scenario.clone(),
            start_date: result.start_date,
            generated_at: result.generated_at,
            endpoints_queried: result.results.len(),
            endpoints_unavailable: result.unavailable_count(),
            duration_seconds: result.duration_seconds,
        },
        summary,
        entries,
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# What-If Prediction Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_results_section(&report.entries));
    output.push_str(&generate_unavailable_section(&report.entries));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Scenario\n\n");
    for line in metadata.scenario.trim().lines() {
        section.push_str(format!("> {}", line).trim_end());
        section.push('\n');
    }
    section.push('\n');
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Start Date:** {}\n", metadata.start_date));
    section.push_str(&format!(
        "- **Endpoints Queried:** {}\n",
        metadata.endpoints_queried
    ));
    if metadata.endpoints_unavailable > 0 {
        section.push_str(&format!(
            "- **Endpoints Unavailable:** {}\n",
            metadata.endpoints_unavailable
        ));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &AggregateSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| ✅ Predictions | 📈 Graphs | ⚠️ Unavailable | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.predictions, summary.graphs, summary.unavailable, summary.total
    ));

    section
}

/// Short cell text for one result.
fn format_value(entry: &ReportEntry) -> String {
    match &entry.result {
        PredictionResult::Prediction { value } => match entry.unit.as_deref() {
            Some(unit) if !unit.is_empty() => format!("{} {}", value, unit),
            _ => value.to_string(),
        },
        PredictionResult::Graph { value } => describe_chart(value),
        PredictionResult::Unavailable { .. } => "unavailable".to_string(),
    }
}

/// Describe a chart spec without dumping it.
fn describe_chart(chart: &Value) -> String {
    let traces = chart
        .get("data")
        .and_then(Value::as_array)
        .map(|d| d.len())
        .unwrap_or(0);
    let title = chart
        .pointer("/layout/title/text")
        .or_else(|| chart.pointer("/layout/title"))
        .and_then(Value::as_str);

    match title {
        Some(title) => format!("chart \"{}\" ({} traces)", title, traces),
        None => format!("chart ({} traces)", traces),
    }
}

/// Generate the results table.
fn generate_results_section(entries: &[ReportEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Results\n\n");

    if entries.is_empty() {
        section.push_str("No endpoints were queried.\n\n");
        return section;
    }

    section.push_str("| Endpoint | Category | Status | Value | Attempts |\n");
    section.push_str("|:---|:---|:---:|:---|:---:|\n");

    for entry in entries {
        let status = if entry.result.is_available() {
            "✅"
        } else {
            "⚠️"
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(&entry.name),
            escape_cell(&entry.category),
            status,
            escape_cell(&format_value(entry)),
            entry.attempts
        ));
    }
    section.push('\n');

    section
}

/// Keep a value inside one table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Generate the unavailable endpoints section.
fn generate_unavailable_section(entries: &[ReportEntry]) -> String {
    let failed: Vec<_> = entries
        .iter()
        .filter_map(|e| match &e.result {
            PredictionResult::Unavailable { error, attempts } => Some((e, error, attempts)),
            _ => None,
        })
        .collect();

    if failed.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Unavailable Endpoints\n\n");
    for (entry, error, attempts) in failed {
        section.push_str(&format!(
            "- **{}** (`{}`) after {} attempt(s): {}\n",
            entry.name, entry.key, attempts, error
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by whatif*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Plain-text summary for the terminal.
pub fn generate_console_summary(report: &Report) -> String {
    generate_summary_text(&report.summary)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{RequestKind, ResponseShape};
    use crate::models::{EndpointDiagnostics, PredictionValue};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn endpoints() -> Vec<EndpointDescriptor> {
        let mut economic = EndpointDescriptor::new(
            "predict_economic_impact",
            RequestKind::Scenario,
            ResponseShape::Prediction {
                field: "predicted_economic_impact_million_usd".into(),
            },
        );
        economic.name = "Economic Impact".into();
        economic.category = "economic".into();
        economic.unit = Some("USD".into());

        let mut energy = EndpointDescriptor::new(
            "predict_electricity",
            RequestKind::StartDate,
            ResponseShape::Graph {
                field: String::new(),
            },
        );
        energy.name = "Energy Demand".into();
        energy.category = "energy".into();

        let mut crop = EndpointDescriptor::new(
            "predict_croprate",
            RequestKind::Scenario,
            ResponseShape::Prediction {
                field: "result.llm_predicted_crop_yield".into(),
            },
        );
        crop.name = "Crop Yield".into();
        crop.category = "agriculture".into();

        vec![economic, energy, crop]
    }

    fn create_test_result() -> AggregateResult {
        let mut results = BTreeMap::new();
        results.insert(
            "predict_economic_impact".to_string(),
            PredictionResult::Prediction {
                value: PredictionValue::Number(42.5),
            },
        );
        results.insert(
            "predict_electricity".to_string(),
            PredictionResult::Graph {
                value: json!({"data": [{}, {}], "layout": {"title": {"text": "Demand"}}}),
            },
        );
        results.insert(
            "predict_croprate".to_string(),
            PredictionResult::unavailable("HTTP 503: overloaded", 5),
        );

        let diagnostics = results
            .keys()
            .map(|k| {
                (
                    k.clone(),
                    EndpointDiagnostics {
                        attempts: if k == "predict_croprate" { 5 } else { 1 },
                        elapsed_ms: 5,
                    },
                )
            })
            .collect();

        AggregateResult {
            scenario: "What if coal plants close by 2030?".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            generated_at: Utc::now(),
            duration_seconds: 4.2,
            results,
            diagnostics,
        }
    }

    #[test]
    fn test_build_report_follows_table_order() {
        let report = build_report(&create_test_result(), &endpoints());

        let keys: Vec<_> = report.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["predict_economic_impact", "predict_electricity", "predict_croprate"]
        );
        assert_eq!(report.metadata.endpoints_unavailable, 1);
        assert_eq!(report.entries[2].attempts, 5);
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = build_report(&create_test_result(), &endpoints());
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# What-If Prediction Report"));
        assert!(markdown.contains("> What if coal plants close by 2030?"));
        assert!(markdown.contains("## Results"));
        assert!(markdown.contains("| Economic Impact | economic | ✅ | 42.50 USD | 1 |"));
        assert!(markdown.contains("chart \"Demand\" (2 traces)"));
        assert!(markdown.contains("## Unavailable Endpoints"));
        assert!(markdown.contains("HTTP 503: overloaded"));
        assert!(markdown.contains("Endpoints Unavailable:** 1"));
    }

    #[test]
    fn test_no_unavailable_section_when_all_succeed() {
        let mut result = create_test_result();
        result.results.insert(
            "predict_croprate".to_string(),
            PredictionResult::Prediction {
                value: PredictionValue::Number(3.2),
            },
        );

        let markdown = generate_markdown_report(&build_report(&result, &endpoints()));
        assert!(!markdown.contains("## Unavailable Endpoints"));
        assert!(!markdown.contains("Endpoints Unavailable"));
    }

    #[test]
    fn test_multiline_scenario_stays_quoted() {
        let mut result = create_test_result();
        result.scenario = "What if\n\nwe stop | burning coal?\n# not a heading".to_string();

        let markdown = generate_markdown_report(&build_report(&result, &endpoints()));
        assert!(markdown.contains("> What if\n>\n> we stop | burning coal?\n> # not a heading\n"));
        assert!(!markdown.contains("\n# not a heading"));
    }

    #[test]
    fn test_table_cells_are_escaped() {
        let mut eps = endpoints();
        eps[0].name = "Economic | Impact".into();
        eps[0].category = "econ\nomic".into();

        let markdown = generate_markdown_report(&build_report(&create_test_result(), &eps));
        assert!(markdown.contains("| Economic \\| Impact | econ omic | ✅ | 42.50 USD | 1 |"));
    }

    #[test]
    fn test_describe_chart_without_title() {
        assert_eq!(describe_chart(&json!({"data": [{}]})), "chart (1 traces)");
        assert_eq!(describe_chart(&json!({})), "chart (0 traces)");
    }

    #[test]
    fn test_generate_json_report() {
        let report = build_report(&create_test_result(), &endpoints());
        let json = generate_json_report(&report).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["entries"][0]["result"]["type"], "prediction");
        assert_eq!(parsed["entries"][0]["result"]["value"], 42.5);
        assert_eq!(parsed["entries"][2]["result"]["type"], "unavailable");
        assert_eq!(parsed["summary"]["unavailable"], 1);
    }

    #[test]
    fn test_write_report() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("report.md");

        write_report("# hello\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hello\n");
    }
}
