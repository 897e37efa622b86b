//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// ProductLens - product safety and sustainability analysis
///
/// Submit a product title and photos, get a per-ingredient (or per-material)
/// risk breakdown and a 0-100 score for the chosen domain.
///
/// Examples:
///   productlens --title "Sunscreen A" --image front.jpg
///   productlens --domain food --title "Granola" --images-dir ./photos
///   productlens --domain plastic --title "Water Bottle" --image a.png --format json
///   productlens --list-domains
///   productlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Analysis domain (chemical, food, pregnancy, plastic, or a configured id)
    ///
    /// Defaults to `general.default_domain` from the config file.
    #[arg(short, long, value_name = "ID", env = "PRODUCTLENS_DOMAIN")]
    pub domain: Option<String>,

    /// Product title
    #[arg(short, long, value_name = "TEXT", required_unless_present_any = ["init_config", "list_domains"])]
    pub title: Option<String>,

    /// Image files to submit (repeatable or comma-separated)
    #[arg(short, long = "image", value_name = "FILE", value_delimiter = ',')]
    pub images: Vec<PathBuf>,

    /// Directory to collect images from
    #[arg(long, value_name = "DIR")]
    pub images_dir: Option<PathBuf>,

    /// Output file path for the report (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .productlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Analyzer timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Use the remote analyzer at this URL instead of the simulated one
    #[arg(long, value_name = "URL", env = "PRODUCTLENS_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Records kept per domain (0 = unbounded)
    #[arg(long, value_name = "COUNT")]
    pub history_cap: Option<usize>,

    /// Fail if the score is below this value
    ///
    /// Useful for CI pipelines. Exit code 2 when the score is lower.
    #[arg(long, value_name = "SCORE")]
    pub fail_below: Option<u8>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// List registered domains and exit
    #[arg(long)]
    pub list_domains: bool,

    /// Generate a default .productlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config || self.list_domains {
            return Ok(());
        }

        if self.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err("Title must not be empty".to_string());
        }

        if self.images.is_empty() && self.images_dir.is_none() {
            return Err("At least one --image or --images-dir is required".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.backend_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Backend URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(threshold) = self.fail_below {
            if threshold > 100 {
                return Err("--fail-below must be between 0 and 100".to_string());
            }
        }

        if let Some(ref dir) = self.images_dir {
            if !dir.is_dir() {
                return Err(format!("Image directory does not exist: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// All image inputs: explicit files first, then the directory.
    pub fn image_inputs(&self) -> Vec<PathBuf> {
        let mut inputs = self.images.clone();
        inputs.extend(self.images_dir.clone());
        inputs
    }
}
