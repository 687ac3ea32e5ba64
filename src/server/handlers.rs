//! Request handlers.

use crate::models::{PredictionResult, ScenarioRequest};
use crate::server::error::ApiResult;
use crate::server::AppState;
use crate::server::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// One row of the endpoint listing
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub key: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub configured: bool,
}

/// List the configured prediction endpoints
pub async fn list_endpoints(State(state): State<AppState>) -> Json<Vec<EndpointInfo>> {
    let endpoints = state
        .aggregator
        .endpoints()
        .iter()
        .map(|e| EndpointInfo {
            key: e.key.clone(),
            name: e.display_name().to_string(),
            category: e.category.clone(),
            unit: e.unit.clone(),
            configured: e.url().is_some(),
        })
        .collect();

    Json(endpoints)
}

/// Body of a what-if submission
#[derive(Debug, Deserialize)]
pub struct WhatIfRequest {
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub start_time: Option<NaiveDate>,
}

/// Run a scenario against every endpoint
pub async fn run_whatif(
    State(state): State<AppState>,
    payload: Result<Json<WhatIfRequest>, JsonRejection>,
) -> ApiResult<Json<BTreeMap<String, PredictionResult>>> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = ScenarioRequest::new(body.scenario)?.with_start_date(body.start_time);

    let result = state.aggregator.aggregate(&request).await?;
    info!(
        "What-if answered: {} available, {} unavailable",
        result.available_count(),
        result.unavailable_count()
    );

    Ok(Json(result.results))
}
