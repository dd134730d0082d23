//! OpenAI-compatible HTTP client
//!
//! Posts chat completion requests to `{base_url}/chat/completions` and
//! decodes both JSON and server-sent-event responses.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;

use super::sse::{SseDecoder, SseFrame};
use super::transport::{
    ChatCompletion, ChatRequest, ChatTransport, EventStream, StreamEvent, TransportError, Usage,
};
use crate::models::Endpoint;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<MessageBody>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<MessageBody>,
}

/// HTTP transport for OpenAI-compatible chat APIs
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create client with a custom connect timeout.
    ///
    /// No overall request timeout is set here; callers bound the whole
    /// exchange including stream consumption.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("llm-bench/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn post(
        &self,
        endpoint: &Endpoint,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, TransportError> {
        let url = chat_url(&endpoint.base_url);
        debug!(
            "Sending {} request to {} ({})",
            if request.stream { "streaming" } else { "unary" },
            url,
            request.model
        );

        let mut builder = self.client.post(&url).json(request);
        if !endpoint.api_key.is_empty() {
            builder = builder.bearer_auth(&endpoint.api_key);
        }
        if request.stream {
            builder = builder.header(header::ACCEPT, "text/event-stream");
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::ConnectionRefused(url.clone())
            } else {
                TransportError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Response: {} from {}", status.as_u16(), url);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(body.trim(), 200),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for OpenAiClient {
    async fn complete(
        &self,
        endpoint: &Endpoint,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, TransportError> {
        let response = self.post(endpoint, request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;
        decode_completion(&body)
    }

    async fn stream(
        &self,
        endpoint: &Endpoint,
        request: &ChatRequest,
    ) -> Result<EventStream, TransportError> {
        let response = self.post(endpoint, request).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Ok(event_stream(bytes))
    }
}

/// Chat completions URL for a base URL
pub fn chat_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn decode_completion(body: &str) -> Result<ChatCompletion, TransportError> {
    let parsed: CompletionBody = serde_json::from_str(body)
        .map_err(|e| TransportError::Malformed(format!("{e}: {}", truncate(body, 200))))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::Malformed("response has no choices".to_string()))?;

    Ok(ChatCompletion {
        content: choice.message.and_then(|m| m.content).unwrap_or_default(),
        usage: parsed.usage,
    })
}

/// Events carried by one SSE data payload
fn decode_chunk(data: &str) -> Result<Vec<StreamEvent>, TransportError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| TransportError::Malformed(format!("{e}: {}", truncate(data, 200))))?;

    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(TransportError::Stream(message));
    }

    let mut events: Vec<StreamEvent> = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .map(StreamEvent::Content)
        .collect();
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage));
    }
    Ok(events)
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamEvent, TransportError>>,
    finished: bool,
}

impl StreamState {
    fn accept(&mut self, frame: SseFrame) {
        if self.finished {
            return;
        }
        match frame {
            SseFrame::Done => self.finished = true,
            SseFrame::Data(data) => match decode_chunk(&data) {
                Ok(events) => self.pending.extend(events.into_iter().map(Ok)),
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                }
            },
        }
    }
}

fn event_stream(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> EventStream {
    let state = StreamState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for frame in state.decoder.push(&chunk) {
                        state.accept(frame);
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(TransportError::Stream(e.to_string())));
                    state.finished = true;
                }
                None => {
                    if let Some(frame) = state.decoder.finish() {
                        state.accept(frame);
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url() {
        assert_eq!(
            chat_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_url("http://localhost:8000/v1/"),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_decode_completion() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "OK"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        }"#;
        let completion = decode_completion(body).unwrap();
        assert_eq!(completion.content, "OK");
        assert_eq!(completion.usage.map(|u| u.total()), Some(13));
    }

    #[test]
    fn test_decode_completion_errors() {
        assert!(matches!(
            decode_completion("not json"),
            Err(TransportError::Malformed(_))
        ));
        assert!(matches!(
            decode_completion(r#"{"choices": []}"#),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_chunk() {
        let events =
            decode_chunk(r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#).unwrap();
        assert_eq!(events, vec![StreamEvent::Content("Hel".into())]);

        let events = decode_chunk(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#)
            .unwrap();
        assert!(events.is_empty());

        let events = decode_chunk(
            r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::Usage(Usage {
                prompt_tokens: 3,
                completion_tokens: 2,
                total_tokens: 5,
            })]
        );
    }

    #[test]
    fn test_decode_chunk_error_payload() {
        let err = decode_chunk(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert_eq!(err, TransportError::Stream("overloaded".into()));
    }

    #[tokio::test]
    async fn test_event_stream_stops_at_done() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\ndata: [DONE]\n\n"
                .to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n".to_vec()),
        ];
        let events: Vec<_> = event_stream(stream::iter(chunks).boxed()).collect().await;

        assert_eq!(
            events,
            vec![
                Ok(StreamEvent::Content("Hi".into())),
                Ok(StreamEvent::Content(" there".into())),
            ]
        );
    }

    #[tokio::test]
    async fn test_event_stream_malformed_chunk_ends_stream() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n".to_vec()),
            Ok(b"data: {oops\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n".to_vec()),
        ];
        let events: Vec<_> = event_stream(stream::iter(chunks).boxed()).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Ok(StreamEvent::Content("Hi".into())));
        assert!(matches!(events[1], Err(TransportError::Malformed(_))));
    }
}
