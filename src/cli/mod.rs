//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Latency and throughput benchmarking for OpenAI-compatible LLM endpoints
#[derive(Parser, Debug)]
#[command(name = "llm-bench")]
#[command(version)]
#[command(about = "Benchmark and compare OpenAI-compatible LLM endpoints")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to the standard search locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Benchmark the configured endpoints
    Benchmark(BenchmarkArgs),

    /// Send one test request to every endpoint
    Test(TestArgs),

    /// Display a saved benchmark run
    Display(DisplayArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for benchmark command
#[derive(Parser, Debug)]
pub struct BenchmarkArgs {
    /// User message sent with every request
    #[arg(short, long, default_value = "Hello, how are you?")]
    pub message: String,

    /// System prompt sent before the message
    #[arg(long)]
    pub system: Option<String>,

    /// Requests per endpoint (overrides config)
    #[arg(short, long)]
    pub requests: Option<usize>,

    /// Concurrent requests per endpoint (overrides config)
    #[arg(short, long)]
    pub concurrent: Option<usize>,

    /// Maximum output tokens per response (0 for no limit)
    #[arg(long, default_value = "100")]
    pub max_tokens: u32,

    /// Stream responses and measure time to first token
    #[arg(short, long)]
    pub streaming: bool,

    /// Only benchmark these providers (repeatable)
    #[arg(short, long = "provider")]
    pub providers: Vec<String>,

    /// Report format (text, json, json-pretty, markdown)
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Append bar charts to the text report
    #[arg(long)]
    pub charts: bool,

    /// Save the run (YAML, or JSON by extension)
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Export one CSV row per request
    #[arg(long)]
    pub export_csv: Option<PathBuf>,

    /// Skip the connection test
    #[arg(long)]
    pub skip_connection_test: bool,
}

/// Arguments for test command
#[derive(Parser, Debug)]
pub struct TestArgs {
    /// Only test these providers (repeatable)
    #[arg(short, long = "provider")]
    pub providers: Vec<String>,
}

/// Arguments for display command
#[derive(Parser, Debug)]
pub struct DisplayArgs {
    /// Saved run file
    pub file: PathBuf,

    /// Append bar charts
    #[arg(long)]
    pub charts: bool,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,

    /// Report format (text, json, json-pretty, markdown)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create an example configuration file
    Init {
        /// Output path
        #[arg(default_value = "./llmbench.yaml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration with masked API keys
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate the configuration
    Validate,

    /// Show environment variables
    Env,
}
