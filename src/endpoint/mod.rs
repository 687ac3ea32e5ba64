//! Prediction endpoint table, request building and response extraction.

pub mod descriptor;
pub mod extract;
pub mod transport;

pub use descriptor::{
    BodyEncoding, EndpointDescriptor, HttpMethod, OutboundRequest, RequestKind, ResponseShape,
};
pub use transport::{HttpTransport, Transport};

/// The prediction services used by the Climatopia what-if page.
pub fn default_endpoints() -> Vec<EndpointDescriptor> {
    fn row(
        key: &str,
        name: &str,
        category: &str,
        unit: Option<&str>,
        url_env: &str,
        request: RequestKind,
        response: ResponseShape,
    ) -> EndpointDescriptor {
        let mut endpoint = EndpointDescriptor::new(key, request, response);
        endpoint.name = name.to_string();
        endpoint.category = category.to_string();
        endpoint.unit = unit.map(String::from);
        endpoint.url_env = Some(url_env.to_string());
        endpoint
    }

    let prediction = |field: &str| ResponseShape::Prediction {
        field: field.to_string(),
    };
    let graph = |field: &str| ResponseShape::Graph {
        field: field.to_string(),
    };

    vec![
        row(
            "predict_economic_impact",
            "Economic Impact",
            "economic",
            Some("USD"),
            "ECONOMIC_API",
            RequestKind::Scenario,
            prediction("predicted_economic_impact_million_usd"),
        ),
        row(
            "predict_croprate",
            "Crop Yield",
            "agriculture",
            Some("tons/ha"),
            "CROP_API",
            RequestKind::Scenario,
            prediction("result.llm_predicted_crop_yield"),
        ),
        row(
            "predict_electricity",
            "Energy Demand",
            "energy",
            Some("GW"),
            "ELECTRICITY_API",
            RequestKind::StartDate,
            graph(""),
        ),
        row(
            "predict_adaptation",
            "Adaptation Strategy",
            "resilience",
            None,
            "ADAPTION_API",
            RequestKind::Scenario,
            prediction("predicted_adaptation_strategy"),
        ),
        row(
            "temperature-graph",
            "Temperature Trend",
            "climate",
            None,
            "TEMP_GRAPH_API",
            RequestKind::None,
            graph("prediction.plotly"),
        )
        .with_method(HttpMethod::Get),
        row(
            "temperature_prediction",
            "Temperature",
            "climate",
            Some("°C"),
            "TEMP_PREDICT_API",
            RequestKind::Scenario,
            prediction("prediction.Temperature"),
        )
        .with_path("temperature_prediction/")
        .with_encoding(BodyEncoding::Query),
        row(
            "humidity_prediction",
            "Humidity",
            "climate",
            Some("%"),
            "HUMIDITY_API",
            RequestKind::Scenario,
            prediction("prediction.predicted_humidity"),
        )
        .with_path("humidity_prediction/"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_table() {
        let endpoints = default_endpoints();
        assert_eq!(endpoints.len(), 7);

        let keys: HashSet<_> = endpoints.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys.len(), 7);
        assert!(keys.contains("predict_electricity"));
        assert!(keys.contains("temperature-graph"));

        // no URLs until configuration resolves them
        assert!(endpoints.iter().all(|e| e.base_url.is_none()));
        assert!(endpoints.iter().all(|e| e.url_env.is_some()));
    }

    #[test]
    fn test_default_graph_endpoints() {
        let graphs: Vec<_> = default_endpoints()
            .into_iter()
            .filter(|e| matches!(e.response, ResponseShape::Graph { .. }))
            .map(|e| e.key)
            .collect();
        assert_eq!(graphs, vec!["predict_electricity", "temperature-graph"]);
    }
}
