//! Benchmark execution engine
//!
//! Provides timed single requests, bounded-concurrency batches per endpoint,
//! and concurrent orchestration across endpoints.

mod client;
mod parallel;
mod progress;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use client::EndpointClient;
pub use parallel::{ConnectionReport, Orchestrator};
pub use progress::{progress_channel, ProgressEvent};
pub use runner::validate_counts;
