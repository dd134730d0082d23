//! Timed request execution against a single endpoint
//!
//! [`EndpointClient`] wraps a [`ChatTransport`] and turns every call into
//! exactly one [`TimedResult`]. Transport errors, timeouts and stream
//! failures become failed records; nothing is propagated to the caller.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tracing::debug;

use crate::http::{ChatRequest, ChatTransport, StreamEvent, TransportError, Usage};
use crate::models::{BenchmarkSpec, Endpoint, RequestMode, StreamMetrics, TimedResult};
use crate::tokens::TokenCounter;
use crate::utils::RequestTimer;

/// Prompt sent by connection tests
pub const CONNECTION_TEST_MESSAGE: &str = "Hello, this is a connection test. Please respond with 'OK'.";

const CONNECTION_TEST_MAX_TOKENS: u32 = 20;

/// Default bound on a whole request, stream consumption included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest streaming window for which throughput is reported
const MIN_THROUGHPUT_WINDOW: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct StreamedReply {
    content: String,
    usage: Option<Usage>,
}

/// Issues single requests and measures them
#[derive(Clone)]
pub struct EndpointClient {
    transport: Arc<dyn ChatTransport>,
    token_counter: Option<Arc<dyn TokenCounter>>,
    timeout: Duration,
}

impl EndpointClient {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            token_counter: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Count tokens locally instead of trusting provider usage
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = Some(counter);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one request in the mode selected by `spec.stream`
    pub async fn send(&self, endpoint: &Endpoint, spec: &BenchmarkSpec) -> TimedResult {
        if spec.stream {
            self.send_stream(endpoint, spec).await
        } else {
            self.send_once(endpoint, spec).await
        }
    }

    /// Send a non-streaming request
    pub async fn send_once(&self, endpoint: &Endpoint, spec: &BenchmarkSpec) -> TimedResult {
        let model = match resolve_model(endpoint, spec, RequestMode::Unary) {
            Ok(model) => model,
            Err(result) => return result,
        };
        let request = ChatRequest::from_spec(spec, &model).with_stream(false);

        let timer = RequestTimer::start();
        let outcome = timeout(self.timeout, self.transport.complete(endpoint, &request)).await;
        let elapsed = timer.elapsed();

        match outcome {
            Err(_) => self.timed_out(endpoint, &model, RequestMode::Unary, elapsed),
            Ok(Err(e)) => failed(endpoint, &model, RequestMode::Unary, elapsed, e),
            Ok(Ok(completion)) => {
                let tokens_used = match &self.token_counter {
                    Some(counter) => {
                        (counter.count_chat(&spec.messages, &model)
                            + counter.count(&completion.content, &model)) as u64
                    }
                    None => completion.usage.map(|u| u.total()).unwrap_or(0),
                };
                debug!(
                    "{} responded in {}ms ({} tokens)",
                    endpoint.name,
                    elapsed.as_millis(),
                    tokens_used
                );
                TimedResult::completed(&endpoint.name, &model, elapsed, tokens_used)
                    .with_response(completion.content)
            }
        }
    }

    /// Send a streaming request and consume the stream to its end
    pub async fn send_stream(&self, endpoint: &Endpoint, spec: &BenchmarkSpec) -> TimedResult {
        let model = match resolve_model(endpoint, spec, RequestMode::Streaming) {
            Ok(model) => model,
            Err(result) => return result,
        };
        let request = ChatRequest::from_spec(spec, &model).with_stream(true);

        let mut timer = RequestTimer::start();
        let outcome = timeout(self.timeout, self.consume(endpoint, &request, &mut timer)).await;
        let elapsed = timer.elapsed();

        let reply = match outcome {
            Err(_) => return self.timed_out(endpoint, &model, RequestMode::Streaming, elapsed),
            Ok(Err(e)) => return failed(endpoint, &model, RequestMode::Streaming, elapsed, e),
            Ok(Ok(reply)) => reply,
        };

        let (input_tokens, output_tokens) = match &self.token_counter {
            Some(counter) => (
                counter.count_chat(&spec.messages, &model) as u64,
                counter.count(&reply.content, &model) as u64,
            ),
            None => reply
                .usage
                .map(|u| (u.total().saturating_sub(u.completion_tokens), u.completion_tokens))
                .unwrap_or((0, 0)),
        };

        let streaming_duration = timer.streaming_duration();
        let token_throughput = streaming_duration
            .filter(|d| *d >= MIN_THROUGHPUT_WINDOW && output_tokens > 0)
            .map(|d| output_tokens as f64 / d.as_secs_f64());

        let metrics = StreamMetrics {
            tokens_used: input_tokens + output_tokens,
            output_tokens,
            time_to_first_token: timer.time_to_first_token(),
            streaming_duration,
            token_throughput,
            response: String::new(),
        };
        debug!(
            "{} streamed in {}ms (ttft {:?}, {} output tokens)",
            endpoint.name,
            elapsed.as_millis(),
            metrics.time_to_first_token,
            output_tokens
        );

        TimedResult::streamed(&endpoint.name, &model, elapsed, metrics).with_response(reply.content)
    }

    /// Minimal non-streaming request; returns the error text on failure
    pub async fn check_connection(&self, endpoint: &Endpoint) -> Result<(), String> {
        let spec = BenchmarkSpec::new(CONNECTION_TEST_MESSAGE)
            .with_max_tokens(CONNECTION_TEST_MAX_TOKENS);
        let result = self.send_once(endpoint, &spec).await;
        match result.error() {
            Some(error) => Err(error.to_string()),
            None => Ok(()),
        }
    }

    async fn consume(
        &self,
        endpoint: &Endpoint,
        request: &ChatRequest,
        timer: &mut RequestTimer,
    ) -> Result<StreamedReply, TransportError> {
        let mut events = self.transport.stream(endpoint, request).await?;
        let mut reply = StreamedReply::default();

        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Content(text) => {
                    if !text.is_empty() {
                        timer.mark_first_token();
                        reply.content.push_str(&text);
                    }
                }
                StreamEvent::Usage(usage) => reply.usage = Some(usage),
            }
        }
        timer.mark_end();
        Ok(reply)
    }

    fn timed_out(
        &self,
        endpoint: &Endpoint,
        model: &str,
        mode: RequestMode,
        elapsed: Duration,
    ) -> TimedResult {
        let error = format!(
            "request timed out after {}",
            humantime::format_duration(self.timeout)
        );
        debug!("{}: {}", endpoint.name, error);
        TimedResult::failed(&endpoint.name, model, mode, elapsed, error)
    }
}

fn failed(
    endpoint: &Endpoint,
    model: &str,
    mode: RequestMode,
    elapsed: Duration,
    error: TransportError,
) -> TimedResult {
    debug!("{} failed after {}ms: {}", endpoint.name, elapsed.as_millis(), error);
    TimedResult::failed(&endpoint.name, model, mode, elapsed, error.to_string())
}

/// Spec override first, then the endpoint's primary model
fn resolve_model(
    endpoint: &Endpoint,
    spec: &BenchmarkSpec,
    mode: RequestMode,
) -> Result<String, TimedResult> {
    spec.model
        .clone()
        .or_else(|| endpoint.primary_model().map(str::to_string))
        .ok_or_else(|| {
            TimedResult::failed(
                &endpoint.name,
                "",
                mode,
                Duration::ZERO,
                format!("no models configured for endpoint {}", endpoint.name),
            )
        })
}
