//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "LLMBENCH";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Config file from LLMBENCH_CONFIG
    pub config_file: Option<String>,
    /// Requests per endpoint from LLMBENCH_REQUESTS
    pub requests: Option<usize>,
    /// Concurrency from LLMBENCH_CONCURRENCY
    pub concurrency: Option<usize>,
    /// Timeout from LLMBENCH_TIMEOUT
    pub timeout: Option<String>,
    /// Log level from LLMBENCH_LOG_LEVEL
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through `lookup`, which receives the full variable name
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            config_file: get("CONFIG"),
            requests: get("REQUESTS").and_then(|v| v.parse().ok()),
            concurrency: get("CONCURRENCY").and_then(|v| v.parse().ok()),
            timeout: get("TIMEOUT"),
            log_level: get("LOG_LEVEL"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.requests.is_some()
            || self.concurrency.is_some()
            || self.timeout.is_some()
            || self.log_level.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {ENV_PREFIX}_CONFIG:       {:?}", self.config_file);
        println!("  {ENV_PREFIX}_REQUESTS:     {:?}", self.requests);
        println!("  {ENV_PREFIX}_CONCURRENCY:  {:?}", self.concurrency);
        println!("  {ENV_PREFIX}_TIMEOUT:      {:?}", self.timeout);
        println!("  {ENV_PREFIX}_LOG_LEVEL:    {:?}", self.log_level);
    }
}

/// Print all LLMBENCH environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG        Path to configuration file");
    println!("  {ENV_PREFIX}_REQUESTS      Requests per endpoint");
    println!("  {ENV_PREFIX}_CONCURRENCY   Concurrent requests per endpoint");
    println!("  {ENV_PREFIX}_TIMEOUT       Per-request timeout (e.g. 30s, 1m30s)");
    println!("  {ENV_PREFIX}_LOG_LEVEL     Log level (trace, debug, info, warn, error)");
    println!("  RUST_LOG              Full tracing filter, overrides the log level");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_REQUESTS=50");
    println!("  export {ENV_PREFIX}_CONCURRENCY=5");
    println!("  llm-bench benchmark --streaming");
}
