//! HTTP transport for OpenAI-compatible endpoints
//!
//! Defines the transport seam used by the executor and its reqwest-backed
//! implementation.

mod client;
mod sse;
mod transport;

pub use client::OpenAiClient;
pub use transport::{ChatRequest, ChatTransport, StreamEvent, TransportError, Usage};

#[cfg(test)]
pub use transport::{ChatCompletion, EventStream};
