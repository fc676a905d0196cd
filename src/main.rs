//! ScreenGrade - batch screenshot grading with a vision LLM
//!
//! A CLI tool that sends each image in a folder to Gemini with a scoring
//! rubric, retries with backoff when rate limited, and writes per-image
//! and per-submitter CSV reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Setup or runtime error (missing folder, no images, no API key, etc.)

mod analysis;
mod classifier;
mod cli;
mod config;
mod models;
mod pipeline;
mod report;
mod scanner;

use anyhow::{Context, Result};
use chrono::Utc;
use classifier::{GeminiClassifier, GeminiConfig, InvokerConfig, RateLimitedInvoker};
use cli::Args;
use config::Config;
use models::RunMetadata;
use pipeline::{BatchRunner, RunnerConfig, TokioSleeper};
use scanner::{ImageScanner, ScanConfig, SetupError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("ScreenGrade v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_grading(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Grading failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .screengrade.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!(
        "✅ Created {} with default settings.",
        config::CONFIG_FILE_NAME
    );
    println!("   Edit it to customize the folder, model, retry timing, and outputs.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete grading workflow. Returns the exit code.
async fn run_grading(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    // Step 1: Find the images. Setup failures stop here, before any API
    // call and before any report file is created.
    let folder = config.general.folder.clone();
    let scan_config = ScanConfig::from(&config.scanner);
    let artifacts = ImageScanner::new(folder.clone(), scan_config).scan()?;

    if args.dry_run {
        return handle_dry_run(&artifacts);
    }

    let api_key = config
        .api_key()
        .ok_or(SetupError::MissingApiKey)?
        .to_string();
    let rubric = classifier::load_rubric(config.model.rubric_file.as_deref())?;

    println!("🤖 Starting grading using {}...", config.model.name);
    println!("   Found {} images in {}", artifacts.len(), folder.display());
    println!(
        "   Retries: {} (backoff {}s × attempt), pacing {}s",
        config.retry.max_attempts, config.retry.base_wait_seconds, config.retry.pacing_seconds
    );

    // Step 2: Wire the pipeline
    let sleeper = Arc::new(TokioSleeper);
    let gemini = GeminiClassifier::new(GeminiConfig {
        api_url: config.model.api_url.clone(),
        api_key,
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?;

    let invoker = RateLimitedInvoker::new(
        InvokerConfig {
            model: config.model.name.clone(),
            rubric,
            max_attempts: config.retry.max_attempts,
            base_wait: config.retry.base_wait(),
        },
        Arc::new(gemini),
        sleeper.clone(),
    );

    let runner = BatchRunner::new(
        RunnerConfig {
            pacing_delay: config.retry.pacing_delay(),
            show_progress: !args.quiet,
        },
        invoker,
        sleeper,
    );

    // Step 3: Grade
    let started_at = Utc::now();
    let start_time = Instant::now();
    let records = runner.run(&artifacts).await;

    // Step 4: Aggregate and save
    let policy = config.report.failed_scores;
    let summaries = analysis::summarize(&records, policy);
    let failed = analysis::failure_count(&records);
    if failed > 0 {
        warn!("{} of {} images failed to grade", failed, records.len());
    }

    report::save_reports(
        &records,
        &summaries,
        &config.report.detailed_output,
        &config.report.summary_output,
    )?;

    let metadata = RunMetadata {
        folder: folder.display().to_string(),
        model_used: config.model.name.clone(),
        started_at,
        images_graded: records.len(),
        images_failed: failed,
        failure_policy: policy,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    println!("\n{}", report::generate_console_summary(&metadata, &summaries));
    println!(
        "✅ Results saved to {} and {}",
        config.report.detailed_output.display(),
        config.report.summary_output.display()
    );

    Ok(0)
}

/// Handle --dry-run: print what would be graded, exit.
fn handle_dry_run(artifacts: &[models::Artifact]) -> Result<i32> {
    println!("\n🔍 Dry run: {} images would be graded\n", artifacts.len());

    for artifact in artifacts {
        println!("     📄 {} -> {}", artifact.file_name, artifact.entity_id);
    }

    println!("\n✅ Dry run complete. No API calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
