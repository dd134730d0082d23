//! Timer utilities
//!
//! Provides timing and measurement helpers. All timers read the tokio clock
//! so that paused-time tests observe exact durations.

use std::time::Duration;
use tokio::time::Instant;

/// Simple timer for measuring elapsed time
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{}: {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}

/// Per-request timer with first-token and end-of-stream marks
#[derive(Clone, Copy, Debug)]
pub struct RequestTimer {
    start: Instant,
    first_token: Option<Instant>,
    end: Option<Instant>,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            first_token: None,
            end: None,
        }
    }

    /// Record the first content fragment; later calls are ignored
    pub fn mark_first_token(&mut self) {
        if self.first_token.is_none() {
            self.first_token = Some(Instant::now());
        }
    }

    /// Record the end of the stream
    pub fn mark_end(&mut self) {
        self.end = Some(Instant::now());
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Start to first token
    pub fn time_to_first_token(&self) -> Option<Duration> {
        self.first_token.map(|t| t.duration_since(self.start))
    }

    /// First token to end of stream
    pub fn streaming_duration(&self) -> Option<Duration> {
        match (self.first_token, self.end) {
            (Some(first), Some(end)) => Some(end.duration_since(first)),
            _ => None,
        }
    }
}
