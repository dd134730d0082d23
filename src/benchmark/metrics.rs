//! Result aggregation
//!
//! Reduces the raw results of a run into per-endpoint summaries: counts,
//! error rate, latency distribution, token totals and streaming statistics.
//! Summaries are always derived from a `ResultSet` and can be recomputed at
//! any time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::{nanos, Outcome, ResultSet, TimedResult};

/// Summaries keyed by endpoint name
pub type SummaryMap = BTreeMap<String, Summary>;

/// Linear-interpolated percentile over sorted samples
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let fraction = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}

/// Minimum and maximum, both seeded from the first sample
fn bounds<T: Copy + PartialOrd>(samples: &[T]) -> Option<(T, T)> {
    let (first, rest) = samples.split_first()?;
    Some(rest.iter().fold((*first, *first), |(lo, hi), &v| {
        (if v < lo { v } else { lo }, if v > hi { v } else { hi })
    }))
}

/// Duration distribution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationStats {
    #[serde(with = "nanos")]
    pub min: Duration,
    #[serde(with = "nanos")]
    pub avg: Duration,
    #[serde(with = "nanos")]
    pub max: Duration,
    #[serde(with = "nanos")]
    pub p50: Duration,
    #[serde(with = "nanos")]
    pub p95: Duration,
    #[serde(with = "nanos")]
    pub p99: Duration,
}

impl DurationStats {
    /// Statistics over `samples`, or `None` when there are none
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        let (min, max) = bounds(samples)?;

        let total: u128 = samples.iter().map(Duration::as_nanos).sum();
        let avg = Duration::from_nanos((total / samples.len() as u128) as u64);

        let mut sorted: Vec<f64> = samples.iter().map(|d| d.as_nanos() as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let at = |p: f64| Duration::from_nanos(percentile(&sorted, p).round() as u64);

        Some(Self {
            min,
            avg,
            max,
            p50: at(50.0),
            p95: at(95.0),
            p99: at(99.0),
        })
    }
}

/// Rate distribution (tokens per second)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl RateStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let (min, max) = bounds(samples)?;
        let avg = samples.iter().sum::<f64>() / samples.len() as f64;
        Some(Self { min, avg, max })
    }
}

/// Aggregated statistics for one endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    /// Failed share of all requests, in percent
    pub error_rate: f64,
    /// Over every record, failures included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<DurationStats>,
    /// Tokens from successful records only
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_token: Option<DurationStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_throughput: Option<RateStats>,
    /// Failure count per distinct error text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_results(endpoint: &str, results: &[TimedResult]) -> Self {
        let total_requests = results.len();
        let successful_requests = results.iter().filter(|r| r.is_success()).count();
        let failed_requests = total_requests - successful_requests;
        let error_rate = if total_requests > 0 {
            failed_requests as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        let response_times: Vec<Duration> = results.iter().map(|r| r.response_time).collect();

        let mut total_tokens = 0u64;
        let mut ttfts = Vec::new();
        let mut throughputs = Vec::new();
        let mut errors = BTreeMap::new();

        for result in results {
            match &result.outcome {
                Outcome::Completed { tokens_used, .. } => total_tokens += tokens_used,
                Outcome::Streamed(metrics) => {
                    total_tokens += metrics.output_tokens;
                    if let Some(ttft) = metrics.time_to_first_token.filter(|d| !d.is_zero()) {
                        ttfts.push(ttft);
                    }
                    if let Some(rate) = metrics.token_throughput.filter(|r| *r > 0.0) {
                        throughputs.push(rate);
                    }
                }
                Outcome::Failed { error, .. } => {
                    *errors.entry(error.clone()).or_insert(0) += 1;
                }
            }
        }

        Self {
            endpoint: endpoint.to_string(),
            model: results.first().map(|r| r.model.clone()),
            total_requests,
            successful_requests,
            failed_requests,
            error_rate,
            response_time: DurationStats::from_samples(&response_times),
            total_tokens,
            time_to_first_token: DurationStats::from_samples(&ttfts),
            token_throughput: RateStats::from_samples(&throughputs),
            errors,
        }
    }

    /// Whether any streaming statistic was measured
    pub fn has_streaming(&self) -> bool {
        self.time_to_first_token.is_some() || self.token_throughput.is_some()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests > 0 {
            100.0 - self.error_rate
        } else {
            0.0
        }
    }
}

/// Summarize every endpoint of a result set
pub fn summarize(results: &ResultSet) -> SummaryMap {
    results
        .iter()
        .map(|(endpoint, records)| (endpoint.clone(), Summary::from_results(endpoint, records)))
        .collect()
}
