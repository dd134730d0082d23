//! Benchmark aggregation and reporting
//!
//! Reduces raw results into per-endpoint summaries and renders them for
//! display.

mod metrics;
mod report;

pub use metrics::{summarize, SummaryMap};
pub use report::{BenchmarkReport, ReportFormat};
