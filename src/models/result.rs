//! Timed request results
//!
//! A `TimedResult` is created exactly once per dispatched request and never
//! mutated afterwards. Its `Outcome` distinguishes success from failure and
//! streaming from non-streaming requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Results of a run keyed by endpoint name, each in completion order
pub type ResultSet = BTreeMap<String, Vec<TimedResult>>;

/// Request dispatch mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Unary,
    Streaming,
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMode::Unary => write!(f, "unary"),
            RequestMode::Streaming => write!(f, "streaming"),
        }
    }
}

/// Measurements taken from a successful streamed response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetrics {
    /// Input plus output tokens
    pub tokens_used: u64,
    /// Tokens counted in the assembled response text
    pub output_tokens: u64,
    /// Call start to first non-empty content fragment
    #[serde(default, with = "nanos::option", skip_serializing_if = "Option::is_none")]
    pub time_to_first_token: Option<Duration>,
    /// First fragment to end of stream
    #[serde(default, with = "nanos::option", skip_serializing_if = "Option::is_none")]
    pub streaming_duration: Option<Duration>,
    /// Output tokens per second over the streaming duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_throughput: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response: String,
}

/// Outcome of a single request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Successful non-streaming request
    Completed {
        tokens_used: u64,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        response: String,
    },
    /// Successful streaming request
    Streamed(StreamMetrics),
    /// Failed request of either mode
    Failed { mode: RequestMode, error: String },
}

/// One request's timed outcome
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedResult {
    pub endpoint: String,
    pub model: String,
    /// Wall-clock time from call start to completion or failure
    #[serde(with = "nanos")]
    pub response_time: Duration,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl TimedResult {
    pub fn completed(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        response_time: Duration,
        tokens_used: u64,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            response_time,
            outcome: Outcome::Completed {
                tokens_used,
                response: String::new(),
            },
        }
    }

    pub fn streamed(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        response_time: Duration,
        metrics: StreamMetrics,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            response_time,
            outcome: Outcome::Streamed(metrics),
        }
    }

    pub fn failed(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        mode: RequestMode,
        response_time: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            response_time,
            outcome: Outcome::Failed {
                mode,
                error: error.into(),
            },
        }
    }

    /// Attach the response text to a successful record
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        match &mut self.outcome {
            Outcome::Completed { response, .. } => *response = text.into(),
            Outcome::Streamed(metrics) => metrics.response = text.into(),
            Outcome::Failed { .. } => {}
        }
        self
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn mode(&self) -> RequestMode {
        match &self.outcome {
            Outcome::Completed { .. } => RequestMode::Unary,
            Outcome::Streamed(_) => RequestMode::Streaming,
            Outcome::Failed { mode, .. } => *mode,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn stream_metrics(&self) -> Option<&StreamMetrics> {
        match &self.outcome {
            Outcome::Streamed(metrics) => Some(metrics),
            _ => None,
        }
    }

    pub fn tokens_used(&self) -> u64 {
        match &self.outcome {
            Outcome::Completed { tokens_used, .. } => *tokens_used,
            Outcome::Streamed(metrics) => metrics.tokens_used,
            Outcome::Failed { .. } => 0,
        }
    }
}

impl fmt::Display for TimedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = if self.is_success() { "✓" } else { "✗" };
        write!(
            f,
            "{symbol} {} [{}ms]",
            self.endpoint,
            self.response_time.as_millis()
        )?;
        if let Some(error) = self.error() {
            write!(f, " - {error}")?;
        }
        Ok(())
    }
}

/// Durations as integer nanoseconds
pub(crate) mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_nanos() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_some(&(d.as_nanos() as u64)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let nanos = Option::<u64>::deserialize(deserializer)?;
            Ok(nanos.map(Duration::from_nanos))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streamed_sample() -> TimedResult {
        TimedResult::streamed(
            "openai",
            "gpt-4o-mini",
            Duration::from_millis(550),
            StreamMetrics {
                tokens_used: 112,
                output_tokens: 100,
                time_to_first_token: Some(Duration::from_millis(50)),
                streaming_duration: Some(Duration::from_millis(500)),
                token_throughput: Some(200.0),
                response: String::new(),
            },
        )
        .with_response("streamed text")
    }

    #[test]
    fn test_result_accessors() {
        let ok = TimedResult::completed("a", "m", Duration::from_millis(100), 42);
        assert!(ok.is_success());
        assert_eq!(ok.mode(), RequestMode::Unary);
        assert_eq!(ok.tokens_used(), 42);
        assert!(ok.error().is_none());

        let failed = TimedResult::failed(
            "a",
            "m",
            RequestMode::Streaming,
            Duration::from_millis(30),
            "connection refused",
        );
        assert!(!failed.is_success());
        assert_eq!(failed.mode(), RequestMode::Streaming);
        assert_eq!(failed.error(), Some("connection refused"));
        assert_eq!(failed.tokens_used(), 0);
        assert!(failed.stream_metrics().is_none());
    }

    #[test]
    fn test_with_response_ignores_failures() {
        let failed = TimedResult::failed("a", "m", RequestMode::Unary, Duration::ZERO, "boom")
            .with_response("ignored");
        assert_eq!(failed.error(), Some("boom"));

        let streamed = streamed_sample();
        assert_eq!(
            streamed.stream_metrics().map(|m| m.response.as_str()),
            Some("streamed text")
        );
    }

    #[test]
    fn test_yaml_preserves_durations() {
        let original = streamed_sample();
        let yaml = serde_yaml::to_string(&original).unwrap();
        assert!(yaml.contains("outcome: streamed"));
        assert!(yaml.contains("response_time: 550000000"));

        let parsed: TimedResult = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_failed_json_shape() {
        let failed = TimedResult::failed(
            "local",
            "llama",
            RequestMode::Unary,
            Duration::from_nanos(1_500),
            "HTTP 500",
        );
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["mode"], "unary");
        assert_eq!(value["error"], "HTTP 500");
        assert_eq!(value["response_time"], 1_500);
    }
}
