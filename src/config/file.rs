//! Configuration file management
//!
//! Handles finding, loading, and initializing configuration files.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{AppConfig, EnvConfig};

/// Configuration file locations (in order of precedence)
pub const CONFIG_LOCATIONS: &[&str] = &[
    "./llmbench.yaml",
    "./llmbench.yml",
    "~/.config/llmbench/llmbench.yaml",
    "/etc/llmbench/llmbench.yaml",
];

/// A configuration loaded from disk
#[derive(Clone, Debug)]
pub struct ConfigFile {
    /// Where the configuration was read from
    pub path: PathBuf,

    /// Parsed configuration, environment overrides applied
    pub config: AppConfig,
}

impl ConfigFile {
    /// Find configuration file.
    ///
    /// An explicit path wins, then the `LLMBENCH_CONFIG` variable, then the
    /// standard locations.
    pub fn find(explicit: Option<&Path>, env: &EnvConfig) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = &env.config_file {
            return Some(expand_path(path));
        }
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Locate, load and apply environment overrides; does not validate
    pub fn discover(explicit: Option<&Path>, env: &EnvConfig) -> Result<Self> {
        let Some(path) = Self::find(explicit, env) else {
            bail!(
                "No configuration file found (searched {}). Run `llm-bench config init` to create one.",
                CONFIG_LOCATIONS.join(", ")
            );
        };

        debug!("Loading configuration from {}", path.display());
        let mut config = AppConfig::load(&path)?;
        config.apply_env(env);

        Ok(Self { path, config })
    }

    /// Like [`ConfigFile::discover`], then validates
    pub fn load_validated(explicit: Option<&Path>, env: &EnvConfig) -> Result<Self> {
        let file = Self::discover(explicit, env)?;
        file.config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", file.path.display()))?;
        Ok(file)
    }

    /// Write the example configuration to `path`
    pub fn init(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }
        AppConfig::example().save(path)
    }
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is JSON based on extension; everything else is YAML
pub(crate) fn is_json_file(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}
