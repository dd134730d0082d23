//! Per-endpoint request runner
//!
//! Dispatches a fixed number of identical requests to one endpoint with at
//! most `concurrency` in flight, collecting one result per dispatched request.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::EndpointClient;
use super::progress::ProgressSink;
use crate::models::{BenchmarkSpec, Endpoint, TimedResult};

/// Run parameter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("request count must be at least 1 (got {0})")]
    InvalidRequestCount(usize),

    #[error("concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(usize),
}

/// Reject counts that would dispatch nothing or never make progress
pub fn validate_counts(request_count: usize, concurrency: usize) -> Result<(), RunError> {
    if request_count == 0 {
        return Err(RunError::InvalidRequestCount(request_count));
    }
    if concurrency == 0 {
        return Err(RunError::InvalidConcurrency(concurrency));
    }
    Ok(())
}

/// Runs a batch of requests against one endpoint
pub struct EndpointRunner {
    client: Arc<EndpointClient>,
    cancel: CancellationToken,
}

impl EndpointRunner {
    pub fn new(client: Arc<EndpointClient>) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop dispatching new requests once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run `request_count` requests, at most `concurrency` at a time.
    ///
    /// Results are returned in completion order. After cancellation, requests
    /// already in flight finish and are included; no new ones start.
    pub async fn run(
        &self,
        endpoint: &Endpoint,
        spec: &BenchmarkSpec,
        request_count: usize,
        concurrency: usize,
        progress: ProgressSink,
    ) -> Result<Vec<TimedResult>, RunError> {
        validate_counts(request_count, concurrency)?;

        let spec = match endpoint.primary_model() {
            Some(model) => spec.for_model(model),
            None => spec.clone(),
        };
        let slots = concurrency.min(request_count);

        info!(
            "Running {} requests against {} ({} concurrent)",
            request_count, endpoint, slots
        );

        let semaphore = Arc::new(Semaphore::new(slots));
        let endpoint = Arc::new(endpoint.clone());
        let spec = Arc::new(spec);
        let collected = Arc::new(Mutex::new(Vec::with_capacity(request_count)));
        let mut handles = Vec::with_capacity(request_count);

        for request_num in 1..=request_count {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(
                        "{}: cancelled after dispatching {}/{} requests",
                        endpoint.name,
                        request_num - 1,
                        request_count
                    );
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let client = self.client.clone();
            let endpoint = endpoint.clone();
            let spec = spec.clone();
            let collected = collected.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                debug!("{}: dispatching request {}", endpoint.name, request_num);

                let result = client.send(&endpoint, &spec).await;

                // Notify under the lock so counts arrive in order
                let mut results = collected.lock().await;
                results.push(result);
                progress.notify(&endpoint.name, results.len(), request_count);
            }));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!("{}: request task failed: {}", endpoint.name, e);
            }
        }

        let results = std::mem::take(&mut *collected.lock().await);
        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            "{}: completed {} requests ({} failed)",
            endpoint.name,
            results.len(),
            failed
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::progress::progress_channel;
    use crate::executor::testing::{endpoint, MockTransport};
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    fn runner(transport: Arc<MockTransport>) -> EndpointRunner {
        EndpointRunner::new(Arc::new(EndpointClient::new(transport)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_request_count() {
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(10)));
        let results = runner(transport.clone())
            .run(
                &endpoint("a"),
                &BenchmarkSpec::new("Hello"),
                7,
                3,
                ProgressSink::disabled(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert_eq!(transport.calls(), 7);
        assert!(results.iter().all(|r| r.endpoint == "a" && r.is_success()));
        assert!(results.iter().all(|r| r.model == "test-model"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound() {
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(100)));
        let start = Instant::now();
        let results = runner(transport.clone())
            .run(
                &endpoint("a"),
                &BenchmarkSpec::new("Hello"),
                10,
                3,
                ProgressSink::disabled(),
            )
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 10);
        assert_eq!(transport.max_in_flight(), 3);
        // four waves of 100ms
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_above_count() {
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(50)));
        let results = runner(transport.clone())
            .run(
                &endpoint("a"),
                &BenchmarkSpec::new("Hello"),
                2,
                16,
                ProgressSink::disabled(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(transport.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort() {
        let transport = Arc::new(
            MockTransport::new()
                .with_delay(Duration::from_millis(10))
                .failing_every(3),
        );
        let results = runner(transport)
            .run(
                &endpoint("a"),
                &BenchmarkSpec::new("Hello"),
                9,
                2,
                ProgressSink::disabled(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 9);
        assert_eq!(results.iter().filter(|r| !r.is_success()).count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic() {
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(10)));
        let (sink, mut rx) = progress_channel();

        runner(transport)
            .run(&endpoint("a"), &BenchmarkSpec::new("Hello"), 5, 2, sink)
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.endpoint, "a");
            assert_eq!(event.total, 5);
            seen.push(event.completed);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_partial_results() {
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(100)));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            canceller.cancel();
        });

        let results = runner(transport.clone())
            .with_cancellation(token)
            .run(
                &endpoint("a"),
                &BenchmarkSpec::new("Hello"),
                10,
                2,
                ProgressSink::disabled(),
            )
            .await
            .unwrap();

        // two waves dispatched before the cancel, both allowed to finish
        assert_eq!(results.len(), 4);
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn test_zero_counts_rejected() {
        let transport = Arc::new(MockTransport::new());
        let runner = runner(transport.clone());
        let spec = BenchmarkSpec::new("Hello");

        let err = runner
            .run(&endpoint("a"), &spec, 0, 2, ProgressSink::disabled())
            .await
            .unwrap_err();
        assert_eq!(err, RunError::InvalidRequestCount(0));

        let err = runner
            .run(&endpoint("a"), &spec, 3, 0, ProgressSink::disabled())
            .await
            .unwrap_err();
        assert_eq!(err, RunError::InvalidConcurrency(0));
        assert_eq!(transport.calls(), 0);
    }
}
