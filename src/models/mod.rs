//! Data models for LLM endpoint benchmarking
//!
//! This module contains all data structures shared by the executor, the
//! aggregator and the persistence layer.

mod endpoint;
mod result;

pub use endpoint::{BenchmarkSpec, ChatMessage, Endpoint};
pub use result::{Outcome, RequestMode, ResultSet, StreamMetrics, TimedResult};

pub(crate) use result::nanos;
