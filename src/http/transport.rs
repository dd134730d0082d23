//! Chat transport boundary
//!
//! The executor talks to endpoints only through [`ChatTransport`], so the
//! HTTP client can be swapped for scripted transports in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BenchmarkSpec, ChatMessage, Endpoint};

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection refused to {0}")]
    ConnectionRefused(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// Chat completion request body
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn from_spec(spec: &BenchmarkSpec, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: spec.messages.clone(),
            max_tokens: spec.max_tokens,
            stream: spec.stream,
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Token usage reported by the provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    /// Reported total, or the sum of its parts when the total is missing
    pub fn total(&self) -> u64 {
        if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.prompt_tokens + self.completion_tokens
        }
    }
}

/// Non-streaming response
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<Usage>,
}

/// One decoded streaming event
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Content fragment; may be empty
    Content(String),
    /// Usage trailer
    Usage(Usage),
}

pub type EventStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// Sends chat requests to an endpoint
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a request and wait for the full response
    async fn complete(
        &self,
        endpoint: &Endpoint,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, TransportError>;

    /// Open a streaming request; the returned stream ends after the last event
    async fn stream(
        &self,
        endpoint: &Endpoint,
        request: &ChatRequest,
    ) -> Result<EventStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let spec = BenchmarkSpec::new("Hello").with_max_tokens(100);
        let request = ChatRequest::from_spec(&spec, "gpt-4o-mini");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_request_omits_unset_max_tokens() {
        let spec = BenchmarkSpec::new("Hello").streaming(true);
        let body = serde_json::to_value(ChatRequest::from_spec(&spec, "m")).unwrap();
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_usage_total() {
        let reported = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 16,
        };
        assert_eq!(reported.total(), 16);

        let partial: Usage =
            serde_json::from_str(r#"{"prompt_tokens":10,"completion_tokens":5}"#).unwrap();
        assert_eq!(partial.total(), 15);
    }
}
