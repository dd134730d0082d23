//! Console formatting for command output
//!
//! Connection-test results, run headers and saved-run metadata.

use std::io::IsTerminal;

use crate::executor::ConnectionReport;
use crate::models::Endpoint;
use crate::results::{RunMetadata, StoredRun};

/// Console formatter
pub struct ConsoleFormatter {
    colorize: bool,
}

impl ConsoleFormatter {
    /// Colorize when stdout is a terminal
    pub fn new() -> Self {
        Self {
            colorize: std::io::stdout().is_terminal(),
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn ok(&self) -> &'static str {
        if self.colorize {
            "\x1b[32m✓\x1b[0m"
        } else {
            "✓"
        }
    }

    fn fail(&self) -> &'static str {
        if self.colorize {
            "\x1b[31m✗\x1b[0m"
        } else {
            "✗"
        }
    }

    /// One line per tested endpoint
    pub fn format_connections(&self, report: &ConnectionReport) -> String {
        let mut output = String::from("Connection test:\n");
        for (name, outcome) in report {
            match outcome {
                Ok(()) => output.push_str(&format!("  {} {}\n", self.ok(), name)),
                Err(error) => {
                    output.push_str(&format!("  {} {}: {}\n", self.fail(), name, error))
                }
            }
        }
        let failed = report.values().filter(|o| o.is_err()).count();
        output.push_str(&format!(
            "{}/{} endpoints reachable\n",
            report.len() - failed,
            report.len()
        ));
        output
    }

    /// Parameters of a run about to start
    pub fn format_run_header(&self, endpoints: &[Endpoint], metadata: &RunMetadata) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Benchmarking {} endpoint(s): {}\n",
            endpoints.len(),
            endpoints
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ));
        output.push_str(&self.format_metadata(metadata));
        output
    }

    pub fn format_metadata(&self, metadata: &RunMetadata) -> String {
        let mut output = String::new();
        output.push_str(&format!("  Message:      {}\n", metadata.message));
        output.push_str(&format!("  Requests:     {}\n", metadata.requests));
        output.push_str(&format!("  Concurrency:  {}\n", metadata.concurrency));
        output.push_str(&format!(
            "  Max tokens:   {}\n",
            metadata
                .max_tokens
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
        output.push_str(&format!(
            "  Streaming:    {}\n",
            if metadata.streaming { "yes" } else { "no" }
        ));
        if metadata.cancelled {
            output.push_str("  Cancelled:    yes (partial results)\n");
        }
        output
    }

    /// Header of a loaded result file
    pub fn format_saved_run(&self, run: &StoredRun) -> String {
        let mut output = String::new();
        output.push_str(&format!("Run {}\n", run.id));
        output.push_str(&format!(
            "  Timestamp:    {}\n",
            run.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&self.format_metadata(&run.metadata));
        output.push_str(&format!(
            "  Tool:         llm-bench {} ({}/{})\n",
            run.environment.tool_version, run.environment.os, run.environment.arch
        ));
        output
    }
}

impl Default for ConsoleFormatter {
    fn default() -> Self {
        Self::new()
    }
}
