//! Concurrent fan-out over all configured prediction endpoints.
//!
//! Every endpoint gets its own retry sequence. All sequences are polled
//! together on the caller's task and the result map is assembled only once
//! each of them has reached a terminal state.

use crate::endpoint::{extract, EndpointDescriptor, Transport};
use crate::error::{AggregateError, EndpointError};
use crate::models::{AggregateResult, EndpointDiagnostics, PredictionResult, ScenarioRequest};
use crate::retry::RetryPolicy;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Tuning knobs beyond the retry policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// Upper bound on a single attempt.
    pub attempt_timeout: Option<Duration>,
    /// Upper bound on an endpoint's whole retry sequence.
    pub endpoint_deadline: Option<Duration>,
}

/// Fans a scenario out to every endpoint and merges the answers.
pub struct PredictionAggregator {
    endpoints: Vec<EndpointDescriptor>,
    policy: RetryPolicy,
    options: AggregatorOptions,
    transport: Arc<dyn Transport>,
}

impl PredictionAggregator {
    /// Creates an aggregator over a validated endpoint table.
    pub fn new(
        endpoints: Vec<EndpointDescriptor>,
        policy: RetryPolicy,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AggregateError> {
        validate_endpoints(&endpoints)?;

        Ok(Self {
            endpoints,
            policy,
            options: AggregatorOptions::default(),
            transport,
        })
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs one aggregation.
    pub async fn aggregate(
        &self,
        request: &ScenarioRequest,
    ) -> Result<AggregateResult, AggregateError> {
        self.aggregate_with_progress(request, |_, _| {}).await
    }

    /// Runs one aggregation, calling `on_complete` as each endpoint settles.
    pub async fn aggregate_with_progress<F>(
        &self,
        request: &ScenarioRequest,
        on_complete: F,
    ) -> Result<AggregateResult, AggregateError>
    where
        F: Fn(&str, &PredictionResult) + Send + Sync,
    {
        let scenario = request.scenario();
        let start_date = request
            .start_date()
            .unwrap_or_else(|| Utc::now().date_naive());
        let started = Instant::now();

        info!(
            endpoints = self.endpoints.len(),
            %start_date,
            "Aggregating predictions"
        );

        let on_complete = &on_complete;
        let calls = self.endpoints.iter().map(|endpoint| async move {
            let (result, diagnostics) = self.query_endpoint(endpoint, scenario, start_date).await;
            on_complete(&endpoint.key, &result);
            (endpoint.key.clone(), result, diagnostics)
        });

        let mut results = BTreeMap::new();
        let mut diagnostics = BTreeMap::new();
        for (key, result, diag) in join_all(calls).await {
            diagnostics.insert(key.clone(), diag);
            results.insert(key, result);
        }

        let duration = started.elapsed();
        let failed: BTreeMap<String, String> = results
            .iter()
            .filter_map(|(key, result)| match result {
                PredictionResult::Unavailable { error, .. } => Some((key.clone(), error.clone())),
                _ => None,
            })
            .collect();

        if failed.len() == results.len() {
            error!("All {} prediction endpoints failed", failed.len());
            return Err(AggregateError::AllEndpointsFailed(failed));
        }

        info!(
            available = results.len() - failed.len(),
            unavailable = failed.len(),
            "Aggregation finished in {:.2}s",
            duration.as_secs_f64()
        );

        Ok(AggregateResult {
            scenario: scenario.to_string(),
            start_date,
            generated_at: Utc::now(),
            duration_seconds: duration.as_secs_f64(),
            results,
            diagnostics,
        })
    }

    /// Runs one endpoint's retry sequence to a terminal state.
    async fn query_endpoint(
        &self,
        endpoint: &EndpointDescriptor,
        scenario: &str,
        start_date: NaiveDate,
    ) -> (PredictionResult, EndpointDiagnostics) {
        let started = Instant::now();

        let request = match endpoint.build_request(scenario, start_date) {
            Ok(request) => request,
            Err(e) => {
                warn!(endpoint = %endpoint.key, "Skipping endpoint: {}", e);
                return (
                    PredictionResult::unavailable(e, 0),
                    EndpointDiagnostics::default(),
                );
            }
        };

        // Shared with the retry closure so a deadline can still report attempts.
        let attempts_made = AtomicU32::new(0);

        let sequence = self.policy.run(|attempt| {
            let request = &request;
            let attempts_made = &attempts_made;
            async move {
                attempts_made.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint = %endpoint.key, attempt, "Calling {}", request.url);
                let outcome = match self.options.attempt_timeout {
                    Some(limit) => tokio::time::timeout(limit, self.transport.send(request))
                        .await
                        .unwrap_or(Err(EndpointError::Timeout(limit))),
                    None => self.transport.send(request).await,
                };
                let outcome = outcome.and_then(|body| extract::extract(&endpoint.response, &body));
                if let Err(ref e) = outcome {
                    warn!(endpoint = %endpoint.key, attempt, "Attempt failed: {}", e);
                }
                outcome
            }
        });

        let (result, attempts) = match self.options.endpoint_deadline {
            Some(deadline) => match tokio::time::timeout(deadline, sequence).await {
                Ok(outcome) => (outcome.result, outcome.attempts),
                Err(_) => {
                    let attempts = attempts_made.load(Ordering::Relaxed);
                    error!(
                        endpoint = %endpoint.key,
                        attempts,
                        "Deadline of {:?} exceeded",
                        deadline
                    );
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    return (
                        PredictionResult::unavailable("deadline exceeded", attempts),
                        EndpointDiagnostics {
                            attempts,
                            elapsed_ms,
                        },
                    );
                }
            },
            None => {
                let outcome = sequence.await;
                (outcome.result, outcome.attempts)
            }
        };

        let result = match result {
            Ok(prediction) => {
                debug!(endpoint = %endpoint.key, attempts, "Endpoint succeeded");
                prediction
            }
            Err(e) => {
                error!(
                    endpoint = %endpoint.key,
                    attempts,
                    "Endpoint unavailable: {}",
                    e
                );
                PredictionResult::unavailable(e, attempts)
            }
        };

        let diagnostics = EndpointDiagnostics {
            attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        (result, diagnostics)
    }
}

/// Checks that the table is non-empty and keys are unique and non-empty.
pub fn validate_endpoints(endpoints: &[EndpointDescriptor]) -> Result<(), AggregateError> {
    if endpoints.is_empty() {
        return Err(AggregateError::NoEndpoints);
    }

    let mut seen = HashSet::new();
    for endpoint in endpoints {
        if endpoint.key.trim().is_empty() {
            return Err(AggregateError::EmptyKey);
        }
        if !seen.insert(endpoint.key.as_str()) {
            return Err(AggregateError::DuplicateEndpoint(endpoint.key.clone()));
        }
    }

    Ok(())
}
