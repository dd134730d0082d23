//! Benchmark report generation
//!
//! Renders summaries as text, markdown or JSON, plus ASCII bar charts for
//! side-by-side comparison of endpoints.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::metrics::{DurationStats, Summary, SummaryMap};
use crate::models::ResultSet;

const CHART_WIDTH: usize = 40;

/// Report output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Plain text
    Text,
    /// JSON format
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Markdown table
    Markdown,
}

impl ReportFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Some(Self::Text),
            "json" => Some(Self::Json),
            "json-pretty" => Some(Self::JsonPretty),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summaries: &'a SummaryMap,
    results: &'a ResultSet,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Benchmark report generator
pub struct BenchmarkReport;

impl BenchmarkReport {
    /// Render in the requested format
    pub fn render(
        summaries: &SummaryMap,
        results: &ResultSet,
        format: ReportFormat,
    ) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(Self::text(summaries)),
            ReportFormat::Markdown => Ok(Self::markdown(summaries)),
            ReportFormat::Json => serde_json::to_string(&JsonReport { summaries, results })
                .context("Failed to serialize report"),
            ReportFormat::JsonPretty => {
                serde_json::to_string_pretty(&JsonReport { summaries, results })
                    .context("Failed to serialize report")
            }
        }
    }

    /// Per-endpoint text blocks, followed by a comparison table when
    /// several endpoints were run
    pub fn text(summaries: &SummaryMap) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{:=^70}\n", " LLM Benchmark Results "));

        if summaries.is_empty() {
            output.push_str("\nNo results.\n");
        }

        for summary in summaries.values() {
            output.push_str(&Self::endpoint_text(summary));
        }

        if summaries.len() > 1 {
            output.push_str(&Self::comparison_table(summaries));
        }

        output.push_str(&format!("\n{:=^70}\n", ""));
        output
    }

    fn endpoint_text(s: &Summary) -> String {
        let mut output = String::new();
        let title = match &s.model {
            Some(model) => format!(" {} ({}) ", s.endpoint, model),
            None => format!(" {} ", s.endpoint),
        };
        output.push_str(&format!("\n{:-^70}\n", title));

        output.push_str(&format!("  Total Requests:    {:>10}\n", s.total_requests));
        output.push_str(&format!("  Successful:        {:>10}\n", s.successful_requests));
        output.push_str(&format!("  Failed:            {:>10}\n", s.failed_requests));
        output.push_str(&format!("  Success Rate:      {:>9.1}%\n", s.success_rate()));
        output.push_str(&format!("  Error Rate:        {:>9.1}%\n", s.error_rate));
        output.push_str(&format!("  Total Tokens:      {:>10}\n", s.total_tokens));

        if let Some(rt) = &s.response_time {
            output.push_str("\n  Response Time (ms):\n");
            output.push_str(&Self::duration_rows(rt, true));
        }

        if s.has_streaming() {
            output.push_str(&Self::streaming_text(s));
        }

        if !s.errors.is_empty() {
            output.push_str("\n  Errors:\n");
            for (error, count) in &s.errors {
                output.push_str(&format!("    {:>5} x {}\n", count, error));
            }
        }

        output
    }

    fn streaming_text(s: &Summary) -> String {
        let mut output = String::new();
        if let Some(ttft) = &s.time_to_first_token {
            output.push_str("\n  Time to First Token (ms):\n");
            output.push_str(&Self::duration_rows(ttft, false));
        }
        if let Some(rate) = &s.token_throughput {
            output.push_str("\n  Token Throughput (tokens/s):\n");
            output.push_str(&format!("    Min:      {:>10.2}\n", rate.min));
            output.push_str(&format!("    Avg:      {:>10.2}\n", rate.avg));
            output.push_str(&format!("    Max:      {:>10.2}\n", rate.max));
        }
        output
    }

    fn duration_rows(stats: &DurationStats, percentiles: bool) -> String {
        let mut rows = String::new();
        rows.push_str(&format!("    Min:      {:>10.2}\n", millis(stats.min)));
        rows.push_str(&format!("    Avg:      {:>10.2}\n", millis(stats.avg)));
        rows.push_str(&format!("    Max:      {:>10.2}\n", millis(stats.max)));
        if percentiles {
            rows.push_str(&format!("    P50:      {:>10.2}\n", millis(stats.p50)));
            rows.push_str(&format!("    P95:      {:>10.2}\n", millis(stats.p95)));
            rows.push_str(&format!("    P99:      {:>10.2}\n", millis(stats.p99)));
        }
        rows
    }

    fn comparison_table(summaries: &SummaryMap) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{:-^70}\n", " Comparison "));
        output.push_str(&format!(
            "{:<20} {:>8} {:>8} {:>10} {:>10} {:>10}\n",
            "Endpoint", "Success", "Err %", "Avg ms", "TTFT ms", "Tok/s"
        ));

        for s in summaries.values() {
            let avg = s
                .response_time
                .map(|rt| format!("{:.2}", millis(rt.avg)))
                .unwrap_or_else(|| "-".to_string());
            let ttft = s
                .time_to_first_token
                .map(|t| format!("{:.2}", millis(t.avg)))
                .unwrap_or_else(|| "-".to_string());
            let rate = s
                .token_throughput
                .map(|r| format!("{:.2}", r.avg))
                .unwrap_or_else(|| "-".to_string());

            output.push_str(&format!(
                "{:<20} {:>8} {:>7.1}% {:>10} {:>10} {:>10}\n",
                s.endpoint,
                format!("{}/{}", s.successful_requests, s.total_requests),
                s.error_rate,
                avg,
                ttft,
                rate
            ));
        }
        output
    }

    /// Summaries as a markdown table
    pub fn markdown(summaries: &SummaryMap) -> String {
        let mut output = String::new();
        output.push_str("# LLM Benchmark Results\n\n");
        output.push_str(
            "| Endpoint | Model | Requests | Failed | Error Rate | Avg (ms) | P95 (ms) | Tokens | TTFT (ms) | Tokens/s |\n",
        );
        output.push_str(
            "|----------|-------|----------|--------|------------|----------|----------|--------|-----------|----------|\n",
        );

        for s in summaries.values() {
            let (avg, p95) = s
                .response_time
                .map(|rt| (format!("{:.2}", millis(rt.avg)), format!("{:.2}", millis(rt.p95))))
                .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
            let ttft = s
                .time_to_first_token
                .map(|t| format!("{:.2}", millis(t.avg)))
                .unwrap_or_else(|| "-".to_string());
            let rate = s
                .token_throughput
                .map(|r| format!("{:.2}", r.avg))
                .unwrap_or_else(|| "-".to_string());

            output.push_str(&format!(
                "| {} | {} | {} | {} | {:.1}% | {} | {} | {} | {} | {} |\n",
                s.endpoint,
                s.model.as_deref().unwrap_or("-"),
                s.total_requests,
                s.failed_requests,
                s.error_rate,
                avg,
                p95,
                s.total_tokens,
                ttft,
                rate
            ));
        }
        output
    }

    /// ASCII bar charts of average TTFT, throughput and response time
    pub fn charts(summaries: &SummaryMap) -> String {
        let mut output = String::new();

        let ttft: Vec<(&str, f64)> = summaries
            .values()
            .filter_map(|s| s.time_to_first_token.map(|t| (s.endpoint.as_str(), millis(t.avg))))
            .collect();
        let throughput: Vec<(&str, f64)> = summaries
            .values()
            .filter_map(|s| s.token_throughput.map(|r| (s.endpoint.as_str(), r.avg)))
            .collect();
        let response: Vec<(&str, f64)> = summaries
            .values()
            .filter_map(|s| s.response_time.map(|rt| (s.endpoint.as_str(), millis(rt.avg))))
            .collect();

        output.push_str(&bar_chart("Average Time to First Token", "ms", &ttft));
        output.push_str(&bar_chart("Average Token Throughput", "tokens/s", &throughput));
        output.push_str(&bar_chart("Average Response Time", "ms", &response));
        output
    }
}

/// One horizontal bar chart; empty when there is nothing to plot
fn bar_chart(title: &str, unit: &str, rows: &[(&str, f64)]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let max = rows.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let label_width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

    let mut output = String::new();
    output.push_str(&format!("\n{title} ({unit})\n"));
    for (name, value) in rows {
        output.push_str(&format!(
            "  {:<width$} │{:<bar_width$}│ {:.2}\n",
            name,
            "█".repeat(bar_len(*value, max)),
            value,
            width = label_width,
            bar_width = CHART_WIDTH
        ));
    }
    output.push_str(&format!(
        "  Legend: █ ≈ {:.2} {unit}, full bar = {:.2} {unit}\n",
        max / CHART_WIDTH as f64,
        max
    ));
    output
}

/// Bar length scaled to `max`; positive values get at least one cell
fn bar_len(value: f64, max: f64) -> usize {
    if max <= 0.0 || value <= 0.0 {
        return 0;
    }
    let len = (value / max * CHART_WIDTH as f64).round() as usize;
    len.clamp(1, CHART_WIDTH)
}
