//! Configuration for coder, read from `.coder/coder.toml`.
//!
//! Settings are layered: file → environment → CLI. An optional `.env` file in
//! the project directory is loaded into the environment first.
//!
//! # Configuration File Format
//!
//! ```toml
//! [service]
//! base_url = "http://localhost:8000/api"
//! timeout_secs = 60
//!
//! [history]
//! threshold = 16
//! batch_size = 10
//! context_window = 10
//!
//! [editor]
//! language = "python"
//! scratch_file = "scratch.py"
//! ```
//!
//! # Environment
//!
//! - `CODER_BASE_URL` overrides `service.base_url`
//! - `CODER_TIMEOUT_SECS` overrides `service.timeout_secs`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::history::{
    CompactionPolicy, DEFAULT_BATCH_SIZE, DEFAULT_CONTEXT_WINDOW, DEFAULT_THRESHOLD,
};

/// Directory holding the config file and the scratch editor file.
pub const CODER_DIR: &str = ".coder";

/// Config file name inside [`CODER_DIR`].
pub const CONFIG_FILE: &str = "coder.toml";

pub const ENV_BASE_URL: &str = "CODER_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "CODER_TIMEOUT_SECS";

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    /// Base URL every endpoint hangs off
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Compaction policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySection {
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_context_window() -> usize {
    DEFAULT_CONTEXT_WINDOW
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            batch_size: default_batch_size(),
            context_window: default_context_window(),
        }
    }
}

/// Editor and code sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSection {
    /// Preferred fenced block tag when syncing code
    #[serde(default = "default_language")]
    pub language: String,
    /// File name of the scratch editor inside `.coder/`
    #[serde(default = "default_scratch_file")]
    pub scratch_file: String,
}

fn default_language() -> String {
    crate::code_sync::DEFAULT_LANGUAGE.to_string()
}

fn default_scratch_file() -> String {
    "scratch.py".to_string()
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            language: default_language(),
            scratch_file: default_scratch_file(),
        }
    }
}

/// The complete coder.toml configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoderToml {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub editor: EditorSection,
}

impl CoderToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(ConfigError::from)
            .context("Failed to parse coder.toml")
    }

    /// Load configuration from `<coder_dir>/coder.toml`.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(coder_dir: &Path) -> Result<Self> {
        let config_path = coder_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize coder.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Base URL, with the environment taking precedence over the file.
    pub fn base_url(&self) -> String {
        std::env::var(ENV_BASE_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.service.base_url.clone())
    }

    /// Request timeout in seconds, with the environment taking precedence.
    pub fn timeout_secs(&self) -> u64 {
        match std::env::var(ENV_TIMEOUT_SECS) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "ignoring invalid {}", ENV_TIMEOUT_SECS);
                self.service.timeout_secs
            }),
            Err(_) => self.service.timeout_secs,
        }
    }

    /// The `[history]` section as a validated policy.
    pub fn compaction_policy(&self) -> Result<CompactionPolicy, ConfigError> {
        CompactionPolicy::new(
            self.history.threshold,
            self.history.batch_size,
            self.history.context_window,
        )
    }

    /// Validate the file's values and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = service_warnings(&self.service.base_url, self.service.timeout_secs);
        warnings.extend(self.section_warnings());
        warnings
    }

    /// Warnings for the `[history]` and `[editor]` sections.
    fn section_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.compaction_policy() {
            warnings.push(e.to_string());
        }

        if self.editor.language.trim().is_empty() {
            warnings.push("editor.language is empty; only untagged blocks will match first".to_string());
        }

        let scratch = &self.editor.scratch_file;
        if scratch.trim().is_empty() || scratch.contains('/') || scratch.contains('\\') {
            warnings.push(format!(
                "Invalid scratch_file '{}': should be a plain file name",
                scratch
            ));
        }

        warnings
    }
}

fn service_warnings(base_url: &str, timeout_secs: u64) -> Vec<String> {
    let mut warnings = Vec::new();

    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        warnings.push(format!(
            "Invalid base_url '{}': should start with http:// or https://",
            base_url
        ));
    }

    if timeout_secs == 0 {
        warnings.push("timeout_secs must be greater than 0".to_string());
    }

    warnings
}

/// Resolved configuration for one invocation.
///
/// It merges settings from:
/// 1. coder.toml file
/// 2. Environment variables (including `.env`)
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct CoderConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Path to the .coder directory
    pub coder_dir: PathBuf,
    /// Parsed coder.toml configuration
    pub toml: CoderToml,
    /// CLI override: verbose mode
    pub verbose: bool,
    /// CLI override for the base URL
    pub cli_base_url: Option<String>,
}

impl CoderConfig {
    /// Create a new CoderConfig from a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        load_dotenv(&project_dir);

        let coder_dir = project_dir.join(CODER_DIR);
        let toml = CoderToml::load_or_default(&coder_dir)?;

        Ok(Self {
            project_dir,
            coder_dir,
            toml,
            verbose: false,
            cli_base_url: None,
        })
    }

    /// Create CoderConfig with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        base_url: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_base_url = base_url;
        Ok(config)
    }

    /// Base URL (CLI → env → file → default).
    pub fn base_url(&self) -> String {
        self.cli_base_url
            .clone()
            .unwrap_or_else(|| self.toml.base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.toml.timeout_secs())
    }

    pub fn compaction_policy(&self) -> Result<CompactionPolicy, ConfigError> {
        self.toml.compaction_policy()
    }

    pub fn language(&self) -> &str {
        &self.toml.editor.language
    }

    /// Get path to coder.toml.
    pub fn config_file(&self) -> PathBuf {
        self.coder_dir.join(CONFIG_FILE)
    }

    /// Get path to the scratch editor file.
    pub fn scratch_file(&self) -> PathBuf {
        self.coder_dir.join(&self.toml.editor.scratch_file)
    }

    /// Validate the effective configuration (file, env and CLI layered)
    /// and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = service_warnings(&self.base_url(), self.toml.timeout_secs());
        warnings.extend(self.toml.section_warnings());
        warnings
    }
}

/// Load `<project_dir>/.env` into the environment, if present.
/// Variables already set are left alone.
fn load_dotenv(project_dir: &Path) {
    let path = project_dir.join(".env");
    if !path.exists() {
        return;
    }
    match dotenvy::from_path(&path) {
        Ok(()) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to load .env"),
    }
}
