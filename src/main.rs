//! llm-bench - LLM Endpoint Benchmarking Tool
//!
//! A CLI tool for measuring latency, reliability and throughput of
//! OpenAI-compatible chat completion endpoints, side by side.
//!
//! ## Features
//!
//! - Concurrent benchmarking of several endpoints, each with its own
//!   concurrency limit
//! - Streaming measurements: time to first token and token throughput
//! - Percentile statistics, error breakdowns and ASCII charts
//! - Saved runs (YAML, JSON) and per-request CSV export
//!
//! ## Usage
//!
//! ```bash
//! # Create a configuration file
//! llm-bench config init
//!
//! # Check that every endpoint answers
//! llm-bench test
//!
//! # 50 streamed requests per endpoint, 5 at a time
//! llm-bench benchmark -r 50 -c 5 --streaming --charts
//!
//! # Save and display later
//! llm-bench benchmark --save runs/latest.yaml
//! llm-bench display runs/latest.yaml
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

mod benchmark;
mod cli;
mod config;
mod executor;
mod http;
mod models;
mod output;
mod results;
mod tokens;
mod utils;

use benchmark::{BenchmarkReport, ReportFormat};
use cli::Args;
use config::{print_env_help, BenchmarkConfig, ConfigFile, EnvConfig};
use executor::{progress_channel, EndpointClient, Orchestrator};
use http::OpenAiClient;
use models::{BenchmarkSpec, ChatMessage};
use output::{ConsoleFormatter, ProgressDisplay};
use results::{RunMetadata, StoredRun};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(log_level(&args, &env)?);

    match args.command {
        cli::Command::Benchmark(ref bench_args) => {
            run_benchmark(&args, bench_args, &env).await?;
        }
        cli::Command::Test(ref test_args) => {
            test_connections(&args, test_args, &env).await?;
        }
        cli::Command::Display(ref display_args) => {
            display_run(&args, display_args)?;
        }
        cli::Command::Config(ref config_args) => {
            manage_config(&args, config_args, &env)?;
        }
    }

    Ok(())
}

/// `--log-level`, then `--verbose`, then `LLMBENCH_LOG_LEVEL`, then info
fn log_level(args: &Args, env: &EnvConfig) -> Result<LogLevel> {
    if let Some(level) = &args.log_level {
        return LogLevel::from_str(level).with_context(|| format!("Unknown log level: {level}"));
    }
    if args.verbose {
        return Ok(LogLevel::Debug);
    }
    Ok(env
        .log_level
        .as_deref()
        .and_then(LogLevel::from_str)
        .unwrap_or(LogLevel::Info))
}

fn formatter(args: &Args) -> ConsoleFormatter {
    let formatter = ConsoleFormatter::new();
    if args.no_color {
        formatter.no_color()
    } else {
        formatter
    }
}

fn build_orchestrator(bench: &BenchmarkConfig) -> Result<Orchestrator> {
    let transport = OpenAiClient::new()?;
    let counter = tokens::counter_for(bench.tokenizer_path().as_deref())?;
    let client = EndpointClient::new(Arc::new(transport))
        .with_token_counter(counter)
        .with_timeout(bench.timeout()?);
    info!(
        "Per-request timeout: {}",
        humantime::format_duration(client.timeout())
    );
    Ok(Orchestrator::new(client))
}

async fn run_benchmark(args: &Args, bench: &cli::BenchmarkArgs, env: &EnvConfig) -> Result<()> {
    let file = ConfigFile::load_validated(args.config.as_deref(), env)?;
    let config = file.config;

    let endpoints = config.select_providers(&bench.providers)?;
    let (requests, concurrency) = config
        .benchmark
        .run_counts(bench.requests, bench.concurrent)?;

    let format = if bench.json {
        ReportFormat::JsonPretty
    } else {
        ReportFormat::from_str(&bench.format)
            .with_context(|| format!("Unknown report format: {}", bench.format))?
    };
    let machine_readable = matches!(format, ReportFormat::Json | ReportFormat::JsonPretty);

    // Keep stdout clean for JSON consumers
    let announce = |text: String| {
        if machine_readable {
            eprint!("{text}");
        } else {
            print!("{text}");
        }
    };

    let mut messages = Vec::new();
    if let Some(system) = &bench.system {
        messages.push(ChatMessage::system(system.as_str()));
    }
    messages.push(ChatMessage::user(bench.message.as_str()));
    let spec = BenchmarkSpec::with_messages(messages)
        .with_max_tokens(bench.max_tokens)
        .streaming(bench.streaming);
    let metadata = RunMetadata::new(&spec, requests, concurrency);

    let formatter = formatter(args);
    let orchestrator = build_orchestrator(&config.benchmark)?;

    announce(formatter.format_run_header(&endpoints, &metadata));

    if !bench.skip_connection_test {
        let report = orchestrator.test_connections(&endpoints).await;
        announce(formatter.format_connections(&report));
        if report.values().any(|outcome| outcome.is_err()) {
            warn!("Some endpoints failed the connection test; benchmarking anyway");
        }
    }

    let (progress, events) = progress_channel();
    let display = if machine_readable {
        ProgressDisplay::hidden()
    } else {
        ProgressDisplay::new()
    }
    .with_endpoints(endpoints.iter().map(|e| e.name.as_str()), requests);
    let display_task = tokio::spawn(display.run(events));

    let cancel = orchestrator.cancellation_token();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, waiting for in-flight requests");
                cancel.cancel();
            }
        }
    });

    let results = orchestrator
        .run_benchmark(&endpoints, &spec, requests, concurrency, progress)
        .await?;

    interrupt.abort();
    if let Err(e) = display_task.await {
        warn!("Progress display failed: {}", e);
    }

    let run = StoredRun::new(metadata.cancelled(cancel.is_cancelled()), results);
    if run.metadata.cancelled {
        warn!("Run cancelled; reporting partial results");
    }

    println!(
        "{}",
        BenchmarkReport::render(&run.summaries, &run.results, format)?
    );
    if bench.charts && !machine_readable {
        println!("{}", BenchmarkReport::charts(&run.summaries));
    }

    if let Some(path) = &bench.save {
        run.save(path)?;
        announce(format!("✓ Results saved to: {}\n", path.display()));
    }
    if let Some(path) = &bench.export_csv {
        run.export_csv(path)?;
        announce(format!("✓ CSV exported to: {}\n", path.display()));
    }

    Ok(())
}

async fn test_connections(args: &Args, test: &cli::TestArgs, env: &EnvConfig) -> Result<()> {
    let file = ConfigFile::load_validated(args.config.as_deref(), env)?;
    let endpoints = file.config.select_providers(&test.providers)?;
    let orchestrator = build_orchestrator(&file.config.benchmark)?;

    let report = orchestrator.test_connections(&endpoints).await;
    print!("{}", formatter(args).format_connections(&report));

    let failed = report.values().filter(|outcome| outcome.is_err()).count();
    if failed > 0 {
        bail!("{failed} of {} endpoints failed the connection test", report.len());
    }
    Ok(())
}

fn display_run(args: &Args, display: &cli::DisplayArgs) -> Result<()> {
    let run = StoredRun::load(&display.file)?;

    let format = if display.json {
        ReportFormat::JsonPretty
    } else {
        ReportFormat::from_str(&display.format)
            .with_context(|| format!("Unknown report format: {}", display.format))?
    };

    if matches!(format, ReportFormat::Json | ReportFormat::JsonPretty) {
        println!(
            "{}",
            BenchmarkReport::render(&run.summaries, &run.results, format)?
        );
        return Ok(());
    }

    print!("{}", formatter(args).format_saved_run(&run));
    println!(
        "{}",
        BenchmarkReport::render(&run.summaries, &run.results, format)?
    );
    if display.charts {
        println!("{}", BenchmarkReport::charts(&run.summaries));
    }
    Ok(())
}

fn manage_config(args: &Args, config_args: &cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match &config_args.action {
        cli::ConfigAction::Init { path, force } => {
            ConfigFile::init(path, *force)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to add your providers and API keys.");
        }

        cli::ConfigAction::Show { format } => {
            let file = ConfigFile::discover(args.config.as_deref(), env)?;
            let masked = file.config.masked();
            let output = if format == "json" {
                serde_json::to_string_pretty(&masked)?
            } else {
                serde_yaml::to_string(&masked)?
            };
            eprintln!("# {}", file.path.display());
            println!("{output}");
        }

        cli::ConfigAction::Validate => {
            let file = ConfigFile::discover(args.config.as_deref(), env)?;
            match file.config.validate() {
                Ok(()) => {
                    println!(
                        "✓ Configuration file is valid: {} ({} providers)",
                        file.path.display(),
                        file.config.benchmark.providers.len()
                    );
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", file.path.display());
                    println!("  Error: {e}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            print_env_help();
            if env.has_any() {
                println!();
                env.print_summary();
            }
        }
    }

    Ok(())
}
