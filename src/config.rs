//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.productlens.toml` files. The `[[domains]]` table is the source of
//! the domain registry; when absent the built-in domains are used.

use crate::registry::{builtin_domain_configs, SchemaVariant};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".productlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analyzer backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// History settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Image ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Registered analysis domains.
    #[serde(default = "builtin_domain_configs")]
    pub domains: Vec<DomainConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            backend: BackendConfig::default(),
            history: HistoryConfig::default(),
            ingest: IngestConfig::default(),
            domains: builtin_domain_configs(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Domain selected when none is given on the command line.
    #[serde(default = "default_domain")]
    pub default_domain: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
            verbose: false,
        }
    }
}

fn default_domain() -> String {
    "chemical".to_string()
}

/// Which analyzer backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process backend serving the built-in catalog.
    #[default]
    Simulated,
    /// Remote backend reached over HTTP.
    Http,
}

/// Analyzer backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Base URL of the HTTP backend.
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Upper bound on a single analysis, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Artificial latency of the simulated backend, in milliseconds.
    #[serde(default = "default_latency")]
    pub simulated_latency_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: default_backend_url(),
            timeout_seconds: default_timeout(),
            simulated_latency_ms: default_latency(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_latency() -> u64 {
    250
}

/// Order in which history lists are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// History settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum records kept per domain. 0 disables the cap.
    #[serde(default = "default_max_per_domain")]
    pub max_per_domain: usize,

    #[serde(default)]
    pub order: HistoryOrder,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_per_domain: default_max_per_domain(),
            order: HistoryOrder::default(),
        }
    }
}

fn default_max_per_domain() -> usize {
    50
}

impl HistoryConfig {
    /// The cap as an option, `None` meaning unbounded.
    pub fn cap(&self) -> Option<usize> {
        (self.max_per_domain > 0).then_some(self.max_per_domain)
    }
}

/// Image ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Image file extensions accepted.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Maximum image size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum images taken from a single ingestion.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
            max_images: default_max_images(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["jpg", "jpeg", "png", "webp", "gif", "heic"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

fn default_max_images() -> usize {
    12
}

/// One entry of the domain registry table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Stable identifier (e.g. "chemical").
    pub id: String,

    /// Display name.
    pub name: String,

    /// Scoring methodology description.
    #[serde(default)]
    pub methodology: String,

    /// Source citations, in display order.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Which finding list the backend reports for this domain.
    #[serde(default)]
    pub schema: SchemaVariant,

    /// Penalty table.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Domain-specific status words mapped to canonical statuses.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Penalties subtracted from 100 per finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub safe_penalty: u32,

    #[serde(default = "default_caution_penalty")]
    pub caution_penalty: u32,

    #[serde(default = "default_high_risk_penalty")]
    pub high_risk_penalty: u32,

    /// Score reported when a product has no findings at all.
    #[serde(default = "default_neutral")]
    pub neutral_default: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            safe_penalty: 0,
            caution_penalty: default_caution_penalty(),
            high_risk_penalty: default_high_risk_penalty(),
            neutral_default: default_neutral(),
        }
    }
}

fn default_caution_penalty() -> u32 {
    15
}

fn default_high_risk_penalty() -> u32 {
    30
}

fn default_neutral() -> u8 {
    50
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when the CLI provides an explicit value.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.backend.timeout_seconds = timeout;
        }

        if let Some(ref url) = args.backend_url {
            self.backend.url = url.clone();
            self.backend.kind = BackendKind::Http;
        }

        if let Some(cap) = args.history_cap {
            self.history.max_per_domain = cap;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level after merging: `--quiet` wins, then verbose from either source.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if args.quiet {
            tracing::Level::ERROR
        } else if self.general.verbose || args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
