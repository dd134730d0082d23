//! Configuration module
//!
//! Handles loading, validating and managing the benchmark configuration:
//! the endpoints under test and default run parameters.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::validate_counts;
use crate::models::Endpoint;

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

fn default_version() -> String {
    "1.0".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_requests() -> usize {
    10
}

fn default_timeout() -> String {
    "30s".to_string()
}

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Benchmark settings
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

/// Endpoints and default run parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Endpoints under test
    #[serde(default)]
    pub providers: Vec<Endpoint>,

    /// Maximum in-flight requests per endpoint
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Requests per endpoint
    #[serde(default = "default_requests")]
    pub requests: usize,

    /// Per-request timeout, e.g. `30s` or `1m30s`
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Hugging Face `tokenizer.json` used for token counts instead of the
    /// character estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            concurrency: default_concurrency(),
            requests: default_requests(),
            timeout: default_timeout(),
            tokenizer: None,
        }
    }
}

impl BenchmarkConfig {
    /// Parsed per-request timeout
    pub fn timeout(&self) -> Result<Duration> {
        let timeout = humantime::parse_duration(self.timeout.trim())
            .with_context(|| format!("Invalid timeout '{}'", self.timeout))?;
        if timeout.is_zero() {
            bail!("Timeout must be greater than zero");
        }
        Ok(timeout)
    }

    /// Request count and concurrency after command-line overrides
    pub fn run_counts(
        &self,
        requests: Option<usize>,
        concurrency: Option<usize>,
    ) -> Result<(usize, usize)> {
        let requests = requests.unwrap_or(self.requests);
        let concurrency = concurrency.unwrap_or(self.concurrency);
        validate_counts(requests, concurrency)?;
        Ok((requests, concurrency))
    }

    /// Tokenizer file with `~` expanded
    pub fn tokenizer_path(&self) -> Option<PathBuf> {
        self.tokenizer.as_deref().map(file::expand_path)
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if file::is_json_file(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if file::is_json_file(path) {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        } else {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            bail!("Unsupported config version: {}", self.version);
        }

        let bench = &self.benchmark;
        if bench.providers.is_empty() {
            bail!("No providers configured");
        }

        let mut names = HashSet::new();
        for (idx, provider) in bench.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                bail!("Provider #{} has no name", idx + 1);
            }
            if !names.insert(provider.name.as_str()) {
                bail!("Duplicate provider name '{}'", provider.name);
            }
            if provider.base_url.trim().is_empty() {
                bail!("Provider '{}' has no base_url", provider.name);
            }
            if provider.api_key.trim().is_empty() {
                bail!("Provider '{}' has no api_key", provider.name);
            }
            if provider.models.is_empty() {
                bail!("Provider '{}' has no models", provider.name);
            }
        }

        if bench.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if bench.requests == 0 {
            bail!("Requests must be at least 1");
        }
        bench.timeout()?;

        if let Some(path) = bench.tokenizer_path() {
            if !path.is_file() {
                bail!("Tokenizer file not found: {}", path.display());
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(requests) = env.requests {
            self.benchmark.requests = requests;
        }
        if let Some(concurrency) = env.concurrency {
            self.benchmark.concurrency = concurrency;
        }
        if let Some(timeout) = &env.timeout {
            self.benchmark.timeout = timeout.clone();
        }
    }

    /// Providers to benchmark; all of them when `names` is empty.
    ///
    /// Repeated names select the provider once, in first-mention order.
    pub fn select_providers(&self, names: &[String]) -> Result<Vec<Endpoint>> {
        if names.is_empty() {
            return Ok(self.benchmark.providers.clone());
        }
        let mut seen = HashSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| {
                self.benchmark
                    .providers
                    .iter()
                    .find(|p| &p.name == name)
                    .cloned()
                    .with_context(|| format!("Unknown provider '{name}'"))
            })
            .collect()
    }

    /// Copy with API keys masked, for display
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        for provider in &mut masked.benchmark.providers {
            provider.api_key = provider.masked_api_key();
        }
        masked
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            benchmark: BenchmarkConfig {
                providers: vec![
                    Endpoint::new("openai", "https://api.openai.com/v1", "your-openai-api-key")
                        .with_model("gpt-4o-mini"),
                    Endpoint::new("local", "http://localhost:8000/v1", "your-local-api-key")
                        .with_model("llama-3.1-8b-instruct"),
                ],
                concurrency: 2,
                requests: 10,
                timeout: default_timeout(),
                tokenizer: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        AppConfig::example()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.benchmark.concurrency, 1);
        assert_eq!(config.benchmark.requests, 10);
        assert_eq!(config.benchmark.timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_yaml_defaults_applied() {
        let yaml = r#"
benchmark:
  providers:
    - name: local
      base_url: http://localhost:8000/v1
      api_key: none-needed
      models: [llama]
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.benchmark.requests, 10);
        assert_eq!(config.benchmark.providers[0].primary_model(), Some("llama"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_is_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = valid();
        config.benchmark.providers.clear();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.benchmark.providers[1].name = "openai".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate provider name 'openai'"));

        let mut config = valid();
        config.benchmark.providers[0].models.clear();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.benchmark.providers[0].api_key = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.benchmark.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.benchmark.requests = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.version = "9.9".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_parsing() {
        let mut bench = BenchmarkConfig::default();
        bench.timeout = "1m30s".to_string();
        assert_eq!(bench.timeout().unwrap(), Duration::from_secs(90));

        bench.timeout = "500ms".to_string();
        assert_eq!(bench.timeout().unwrap(), Duration::from_millis(500));

        bench.timeout = "soon".to_string();
        assert!(bench.timeout().is_err());

        bench.timeout = "0s".to_string();
        assert!(bench.timeout().is_err());
    }

    #[test]
    fn test_apply_env() {
        let mut config = valid();
        let env = EnvConfig {
            requests: Some(50),
            timeout: Some("2m".to_string()),
            ..Default::default()
        };
        config.apply_env(&env);

        assert_eq!(config.benchmark.requests, 50);
        assert_eq!(config.benchmark.concurrency, 2);
        assert_eq!(config.benchmark.timeout().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_select_providers() {
        let config = valid();
        assert_eq!(config.select_providers(&[]).unwrap().len(), 2);

        let selected = config.select_providers(&["local".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "local");

        assert!(config.select_providers(&["missing".to_string()]).is_err());
    }

    #[test]
    fn test_select_providers_deduplicates() {
        let config = valid();
        let names = ["local", "openai", "local"].map(String::from);
        let selected = config.select_providers(&names).unwrap();

        let selected: Vec<_> = selected.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(selected, vec!["local", "openai"]);
    }

    #[test]
    fn test_run_counts() {
        let bench = valid().benchmark;
        assert_eq!(bench.run_counts(None, None).unwrap(), (10, 2));
        assert_eq!(bench.run_counts(Some(50), Some(5)).unwrap(), (50, 5));

        let err = bench.run_counts(Some(0), None).unwrap_err().to_string();
        assert!(err.contains("request count must be at least 1"));
        let err = bench.run_counts(None, Some(0)).unwrap_err().to_string();
        assert!(err.contains("concurrency must be at least 1"));
    }

    #[test]
    fn test_tokenizer_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");

        let mut config = valid();
        config.benchmark.tokenizer = Some(path.to_string_lossy().to_string());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Tokenizer file not found"));

        std::fs::write(&path, "{}").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.benchmark.tokenizer_path(), Some(path));
    }

    #[test]
    fn test_masked() {
        let masked = valid().masked();
        assert_eq!(masked.benchmark.providers[0].api_key, "your...-key");
        assert_eq!(valid().benchmark.providers[0].api_key, "your-openai-api-key");
    }
}
