//! Multi-endpoint orchestration
//!
//! Runs the per-endpoint batches concurrently and merges their results into
//! a single [`ResultSet`]. Also drives the connection tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::client::EndpointClient;
use super::progress::ProgressSink;
use super::runner::{validate_counts, EndpointRunner, RunError};
use crate::models::{BenchmarkSpec, Endpoint, ResultSet};
use crate::utils::Timer;

/// Connection-test outcome per endpoint name; `Err` holds the failure text
pub type ConnectionReport = BTreeMap<String, Result<(), String>>;

/// Benchmarks several endpoints at once
pub struct Orchestrator {
    client: Arc<EndpointClient>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(client: EndpointClient) -> Self {
        Self {
            client: Arc::new(client),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops dispatch on every endpoint when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Benchmark every endpoint concurrently.
    ///
    /// Each endpoint gets its own concurrency budget. The returned set has
    /// one entry per endpoint; an empty endpoint list yields an empty set.
    pub async fn run_benchmark(
        &self,
        endpoints: &[Endpoint],
        spec: &BenchmarkSpec,
        request_count: usize,
        concurrency: usize,
        progress: ProgressSink,
    ) -> Result<ResultSet, RunError> {
        validate_counts(request_count, concurrency)?;

        if endpoints.is_empty() {
            warn!("No endpoints to benchmark");
            return Ok(ResultSet::new());
        }

        info!(
            "Benchmarking {} endpoints: {} requests each, {} concurrent",
            endpoints.len(),
            request_count,
            concurrency
        );

        let timer = Timer::start("benchmark run");
        let merged = Arc::new(Mutex::new(ResultSet::new()));
        let mut handles = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let runner =
                EndpointRunner::new(self.client.clone()).with_cancellation(self.cancel.clone());
            let endpoint = endpoint.clone();
            let spec = spec.clone();
            let progress = progress.clone();
            let merged = merged.clone();

            handles.push(tokio::spawn(async move {
                match runner
                    .run(&endpoint, &spec, request_count, concurrency, progress)
                    .await
                {
                    Ok(results) => {
                        merged.lock().await.insert(endpoint.name.clone(), results);
                    }
                    Err(e) => warn!("{}: {}", endpoint.name, e),
                }
            }));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!("Endpoint task failed: {}", e);
            }
        }

        let elapsed = timer.stop();
        let results = std::mem::take(&mut *merged.lock().await);
        info!(
            "Benchmark finished in {}ms ({} endpoints)",
            elapsed.as_millis(),
            results.len()
        );

        Ok(results)
    }

    /// Send one minimal request to every endpoint concurrently
    pub async fn test_connections(&self, endpoints: &[Endpoint]) -> ConnectionReport {
        let handles: Vec<_> = endpoints
            .iter()
            .cloned()
            .map(|endpoint| {
                let client = self.client.clone();
                tokio::spawn(async move {
                    let outcome = client.check_connection(&endpoint).await;
                    if let Err(e) = &outcome {
                        warn!("Connection test failed for {}: {}", endpoint.name, e);
                    }
                    (endpoint.name, outcome)
                })
            })
            .collect();

        let mut report = ConnectionReport::new();
        for joined in join_all(handles).await {
            match joined {
                Ok((name, outcome)) => {
                    report.insert(name, outcome);
                }
                Err(e) => warn!("Connection test task failed: {}", e),
            }
        }
        report
    }
}
