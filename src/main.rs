//! ProductLens - multi-domain product safety analysis
//!
//! A CLI front end for the analysis engine: collects a title and images,
//! runs one analysis for the chosen domain and renders the result.
//!
//! Exit codes:
//!   0 - Success (score at or above --fail-below, or no threshold set)
//!   1 - Runtime error (config, ingestion, analyzer failure, etc.)
//!   2 - Score below the --fail-below threshold

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use productlens::analysis::generate_summary_text;
use productlens::cli::{Args, OutputFormat};
use productlens::config::{Config, CONFIG_FILE_NAME};
use productlens::ingest::{ImageScanConfig, ImageScanner};
use productlens::registry::DomainRegistry;
use productlens::report;
use productlens::OrchestratorState;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let filter = init_logging(&args);

    info!("ProductLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, filter).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .productlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize backend settings and the domain table.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` overrides the verbosity flags when set.
///
/// Returns a handle for raising the level once the config file is read,
/// or `None` when `RUST_LOG` is in charge.
fn init_logging(args: &Args) -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let env_override = from_env.is_some();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(args.log_level().as_str()));
    let (filter, handle) = reload::Layer::new(filter);

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return None;
    }
    (!env_override).then_some(handle)
}

/// Run one analysis session. Returns the exit code (0 or 2).
async fn run(args: Args, filter: Option<FilterHandle>) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let level = config.log_level(&args);
    if let Some(handle) = filter.filter(|_| level != args.log_level()) {
        if let Err(e) = handle.reload(EnvFilter::new(level.as_str())) {
            warn!("Failed to apply configured log level: {}", e);
        }
    }

    if args.list_domains {
        return handle_list_domains(&config);
    }

    let state = OrchestratorState::from_config(&config)?;
    if let Some(ref domain) = args.domain {
        state.select_domain(domain)?;
    }
    let domain_id = state.active_domain();

    // Step 1: Collect images
    let scanner = ImageScanner::new(ImageScanConfig::from(&config.ingest));
    let images = scanner
        .collect(args.image_inputs().as_slice())
        .context("Failed to collect images")?;
    if images.is_empty() {
        anyhow::bail!("No usable images found in the given inputs");
    }

    // Step 2: Build the submission
    state.set_title(args.title.as_deref().unwrap_or_default());
    state.add_images(images);

    let domain = state.registry().get_domain(&domain_id)?;
    // Console chatter only when the report itself is not going to stdout.
    let chatty = !args.quiet && args.output.is_some();
    if chatty {
        let submission = state.submission();
        println!("🔬 Analyzing '{}' ({})", submission.title, domain.name);
        println!("   Images: {}", submission.images.len());
    }

    // Step 3: Dispatch
    let spinner = (!args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
        {
            pb.set_style(style);
        }
        pb.set_message("Waiting for analyzer...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let outcome = state.analyze().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let record = match outcome {
        Ok(record) => record,
        Err(e) if e.is_user_correctable() => {
            anyhow::bail!("Submission is incomplete: {}", e)
        }
        Err(e) => return Err(e).context("Analysis did not complete"),
    };

    // Step 4: Render
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&record)?,
        OutputFormat::Markdown => report::generate_markdown_report(&record, domain),
    };

    match args.output {
        Some(ref path) => {
            report::write_report(&output, path)?;
            info!("Report saved to {}", path.display());
        }
        None => println!("{}", output),
    }

    if chatty {
        let band = record.result.score_band();
        println!("\n📊 {} score: {}/100 {} {}", domain.name, record.score(), band.emoji(), band);
        println!("{}", generate_summary_text(&record.result.summary()));
        println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
        if let Some(ref path) = args.output {
            println!("\n✅ Analysis complete! Report saved to: {}", path.display());
        }
    } else {
        debug!("Finished in {:.1}s", start_time.elapsed().as_secs_f64());
    }

    // Check --fail-below threshold
    if let Some(threshold) = args.fail_below {
        if record.score() < threshold {
            eprintln!(
                "\n⛔ Score {} is below the threshold of {}. Failing (exit code 2).",
                record.score(),
                threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Handle --list-domains: print the registry and exit.
fn handle_list_domains(config: &Config) -> Result<i32> {
    let registry = DomainRegistry::from_configs(&config.domains)?;

    println!("📚 Registered domains:\n");
    for domain in registry.list_domains() {
        let marker = if domain.id == config.general.default_domain {
            " (default)"
        } else {
            ""
        };
        println!("   {} - {}{}", domain.id, domain.name, marker);
        println!(
            "     penalties: caution {}, high risk {}; empty products score {}",
            domain.scoring.caution_penalty,
            domain.scoring.high_risk_penalty,
            domain.scoring.neutral_default
        );
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
