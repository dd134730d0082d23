//! Scripted transports shared by executor tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::time::sleep;

use crate::http::{
    ChatCompletion, ChatRequest, ChatTransport, EventStream, StreamEvent, TransportError, Usage,
};
use crate::models::Endpoint;
use crate::tokens::TokenCounter;

/// One step of a scripted stream: wait, then optionally emit an event
pub type ScriptStep = (Duration, Option<Result<StreamEvent, TransportError>>);

/// Transport with fixed latency that records concurrency
#[derive(Default)]
pub struct MockTransport {
    delay: Duration,
    reply: String,
    usage: Option<Usage>,
    fail_every: Option<usize>,
    script: Vec<ScriptStep>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            reply: "OK".to_string(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Fail every `n`th call (1-based)
    pub fn failing_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n);
        self
    }

    pub fn with_script(mut self, script: Vec<ScriptStep>) -> Self {
        self.script = script;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> Result<(), TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.fail_every {
            Some(n) if n > 0 && call % n == 0 => Err(TransportError::Status {
                status: 500,
                body: "internal error".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn complete(
        &self,
        _endpoint: &Endpoint,
        _request: &ChatRequest,
    ) -> Result<ChatCompletion, TransportError> {
        self.begin().await?;
        Ok(ChatCompletion {
            content: self.reply.clone(),
            usage: self.usage,
        })
    }

    async fn stream(
        &self,
        _endpoint: &Endpoint,
        _request: &ChatRequest,
    ) -> Result<EventStream, TransportError> {
        self.begin().await?;
        let events = stream::iter(self.script.clone())
            .then(|(delay, event)| async move {
                sleep(delay).await;
                event
            })
            .filter_map(|event| async move { event })
            .boxed();
        Ok(events)
    }
}

/// Counter returning the same count for every text
pub struct FixedCounter(pub usize);

impl TokenCounter for FixedCounter {
    fn count(&self, _text: &str, _model: &str) -> usize {
        self.0
    }
}

pub fn endpoint(name: &str) -> Endpoint {
    Endpoint::new(name, format!("http://{name}.test/v1"), "sk-test-key").with_model("test-model")
}
