//! Results storage and retrieval
//!
//! Saves benchmark runs as YAML or JSON (chosen by file extension), loads
//! them back for display, and exports raw results as CSV.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

use crate::benchmark::{summarize, SummaryMap};
use crate::models::{BenchmarkSpec, ResultSet};

/// Parameters a run was started with
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub message: String,
    pub requests: usize,
    pub concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub streaming: bool,
    /// Run was stopped before every request was dispatched
    #[serde(default)]
    pub cancelled: bool,
}

impl RunMetadata {
    pub fn new(spec: &BenchmarkSpec, requests: usize, concurrency: usize) -> Self {
        Self {
            message: spec.prompt().to_string(),
            requests,
            concurrency,
            max_tokens: spec.max_tokens,
            streaming: spec.stream,
            cancelled: false,
        }
    }

    pub fn cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }
}

/// Environment information
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system
    pub os: String,

    /// Architecture
    pub arch: String,

    /// Tool version
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A saved benchmark run.
///
/// Raw results are the source of truth; `summaries` is stored for
/// convenience and recomputed on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    /// Timestamp when the run finished
    pub timestamp: DateTime<Utc>,

    pub metadata: RunMetadata,

    #[serde(default)]
    pub environment: EnvironmentInfo,

    #[serde(default)]
    pub summaries: SummaryMap,

    pub results: ResultSet,
}

impl StoredRun {
    pub fn new(metadata: RunMetadata, results: ResultSet) -> Self {
        Self {
            id: generate_run_id(),
            timestamp: Utc::now(),
            metadata,
            environment: EnvironmentInfo::default(),
            summaries: summarize(&results),
            results,
        }
    }

    /// Save to `path`, format chosen by extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = FileFormat::from_extension(path).unwrap_or(FileFormat::Yaml);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        match format {
            FileFormat::Yaml => {
                let file = File::create(path).context("Failed to create results file")?;
                serde_yaml::to_writer(BufWriter::new(file), self)
                    .context("Failed to write results")?;
            }
            FileFormat::Json => {
                let file = File::create(path).context("Failed to create results file")?;
                serde_json::to_writer_pretty(BufWriter::new(file), self)
                    .context("Failed to write results")?;
            }
            FileFormat::Csv => self.export_csv(path)?,
        }

        info!("Saved benchmark results to {}", path.display());
        Ok(())
    }

    /// Load a saved run, recomputing the summaries from raw results
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut run: StoredRun = match FileFormat::from_extension(path) {
            Some(FileFormat::Json) => {
                serde_json::from_reader(reader).context("Failed to parse results")?
            }
            Some(FileFormat::Csv) => bail!("CSV exports cannot be loaded: {}", path.display()),
            _ => serde_yaml::from_reader(reader).context("Failed to parse results")?,
        };
        run.summaries = summarize(&run.results);

        debug!("Loaded benchmark results from {}", path.display());
        Ok(run)
    }

    /// One CSV row per request
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        writer.write_record([
            "endpoint",
            "model",
            "mode",
            "success",
            "response_time_ms",
            "tokens_used",
            "output_tokens",
            "time_to_first_token_ms",
            "streaming_duration_ms",
            "token_throughput",
            "error",
        ])?;

        let ms = |d: std::time::Duration| format!("{:.3}", d.as_secs_f64() * 1000.0);

        for result in self.results.values().flatten() {
            let metrics = result.stream_metrics();
            writer.write_record([
                result.endpoint.clone(),
                result.model.clone(),
                result.mode().to_string(),
                result.is_success().to_string(),
                ms(result.response_time),
                result.tokens_used().to_string(),
                metrics
                    .map(|m| m.output_tokens.to_string())
                    .unwrap_or_default(),
                metrics
                    .and_then(|m| m.time_to_first_token)
                    .map(ms)
                    .unwrap_or_default(),
                metrics
                    .and_then(|m| m.streaming_duration)
                    .map(ms)
                    .unwrap_or_default(),
                metrics
                    .and_then(|m| m.token_throughput)
                    .map(|t| format!("{t:.2}"))
                    .unwrap_or_default(),
                result.error().unwrap_or_default().to_string(),
            ])?;
        }
        writer.flush()?;

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

/// Generate a unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Result file format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
    Csv,
}

impl FileFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Some(FileFormat::Yaml),
            "json" => Some(FileFormat::Json),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestMode, StreamMetrics, TimedResult};
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_run() -> StoredRun {
        let mut results = ResultSet::new();
        results.insert(
            "openai".into(),
            vec![
                TimedResult::completed("openai", "gpt-4o-mini", Duration::from_millis(120), 30)
                    .with_response("Hi!"),
                TimedResult::failed(
                    "openai",
                    "gpt-4o-mini",
                    RequestMode::Unary,
                    Duration::from_millis(30_000),
                    "request timed out after 30s",
                ),
            ],
        );
        results.insert(
            "local".into(),
            vec![TimedResult::streamed(
                "local",
                "llama",
                Duration::from_millis(550),
                StreamMetrics {
                    tokens_used: 106,
                    output_tokens: 100,
                    time_to_first_token: Some(Duration::from_millis(50)),
                    streaming_duration: Some(Duration::from_millis(500)),
                    token_throughput: Some(200.0),
                    response: "tokens".into(),
                },
            )],
        );

        let spec = BenchmarkSpec::new("Hello, how are you?").with_max_tokens(100);
        StoredRun::new(RunMetadata::new(&spec, 2, 1), results)
    }

    #[test]
    fn test_generate_run_id() {
        let id = generate_run_id();
        assert_eq!(id.len(), "20240101_120000_0000".len());
    }

    #[test]
    fn test_file_format() {
        assert_eq!(
            FileFormat::from_extension(Path::new("out/run.yml")),
            Some(FileFormat::Yaml)
        );
        assert_eq!(
            FileFormat::from_extension(Path::new("run.JSON")),
            Some(FileFormat::Json)
        );
        assert_eq!(FileFormat::from_extension(Path::new("run")), None);
    }

    #[test]
    fn test_metadata_from_spec() {
        let run = sample_run();
        assert_eq!(run.metadata.message, "Hello, how are you?");
        assert_eq!(run.metadata.max_tokens, Some(100));
        assert!(!run.metadata.streaming);
        assert!(!run.metadata.cancelled);
        assert_eq!(run.summaries["openai"].error_rate, 50.0);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/run.yaml");
        let run = sample_run();

        run.save(&path).unwrap();
        let loaded = StoredRun::load(&path).unwrap();
        assert_eq!(loaded, run);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        let run = sample_run();

        run.save(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"time_to_first_token\": 50000000"));

        let loaded = StoredRun::load(&path).unwrap();
        assert_eq!(loaded.results, run.results);
    }

    #[test]
    fn test_load_recomputes_summaries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        let mut run = sample_run();
        run.summaries.clear();
        run.save(&path).unwrap();

        let loaded = StoredRun::load(&path).unwrap();
        assert_eq!(loaded.summaries.len(), 2);
        assert_eq!(loaded.summaries["local"].total_tokens, 100);
    }

    #[test]
    fn test_csv_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.csv");
        sample_run().export_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);

        // BTreeMap order: local before openai
        assert_eq!(&rows[0][0], "local");
        assert_eq!(&rows[0][2], "streaming");
        assert_eq!(&rows[0][7], "50.000");
        assert_eq!(&rows[0][9], "200.00");
        assert_eq!(&rows[2][3], "false");
        assert_eq!(&rows[2][10], "request timed out after 30s");
    }

    #[test]
    fn test_csv_not_loadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.csv");
        sample_run().save(&path).unwrap();
        assert!(StoredRun::load(&path).is_err());
    }
}
