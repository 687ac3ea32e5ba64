//! whatif - climate what-if prediction aggregator
//!
//! Sends one scenario to a set of independent prediction services in
//! parallel, retries each one on failure, and merges the answers into a
//! single report. Can also serve the same aggregation over HTTP.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad config, empty scenario, every endpoint failed, etc.)
//!   2 - Some endpoints unavailable and --fail-on-partial was set

mod aggregator;
mod cli;
mod config;
mod endpoint;
mod error;
mod models;
mod report;
mod retry;
mod server;

use aggregator::{group_by_category, unavailable_endpoints, PredictionAggregator};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use endpoint::HttpTransport;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use models::ScenarioRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

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

    // Config is loaded first so its verbosity setting can shape logging
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.general.log_level(args.quiet))?;

    info!("whatif v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!(
        endpoints = config.endpoints.len(),
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Aggregation failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .whatif.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set endpoint URLs, retry policy, and server address.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the configured level when set.
fn init_logging(level: tracing::Level) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact();

    let result = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(
            builder.with_env_filter(filter).finish(),
        ),
        Err(_) => tracing::subscriber::set_global_default(
            builder.with_max_level(level).finish(),
        ),
    };

    result.context("Failed to set tracing subscriber")
}

/// Dispatch to serve, dry-run, or a single aggregation. Returns the exit code.
async fn run(args: Args, mut config: Config) -> Result<i32> {
    config.resolve_env();
    config.validate()?;

    if args.dry_run {
        return handle_dry_run(&config);
    }

    let aggregator = build_aggregator(&config)?;

    if args.serve {
        let addr = config.server.listen_addr()?;
        println!("🌐 Serving what-if API on http://{}", addr);
        server::serve(Arc::new(aggregator), addr).await?;
        return Ok(0);
    }

    run_once(&args, &config, &aggregator).await
}

fn build_aggregator(config: &Config) -> Result<PredictionAggregator> {
    let transport = HttpTransport::new(config.retry.attempt_timeout())?;

    let aggregator = PredictionAggregator::new(
        config.endpoints.clone(),
        config.retry.policy(),
        Arc::new(transport),
    )?
    .with_options(config.retry.options());

    Ok(aggregator)
}

/// Run one aggregation and write the report.
async fn run_once(args: &Args, config: &Config, aggregator: &PredictionAggregator) -> Result<i32> {
    let scenario = args.scenario.clone().unwrap_or_default();
    let request = ScenarioRequest::new(scenario)?.with_start_date(args.start_date);

    let endpoints = aggregator.endpoints();
    let policy = aggregator.policy();
    if !args.quiet {
        eprintln!(
            "🔮 Querying {} prediction endpoints ({} attempts, {}ms apart)...",
            endpoints.len(),
            policy.max_attempts,
            policy.delay.as_millis()
        );
    }

    let progress = ProgressBar::new(endpoints.len() as u64);
    if args.quiet {
        progress.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        progress.enable_steady_tick(Duration::from_millis(120));
    }

    let outcome = aggregator
        .aggregate_with_progress(&request, |key, result| {
            progress.set_message(format!("{} {}", key, result.status()));
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    let result = outcome?;
    let report = report::build_report(&result, endpoints);

    let output = match OutputFormat::from(config.general.format) {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            report::write_report(&output, path)?;
            if !args.quiet {
                eprintln!("📝 Report saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    if !args.quiet {
        eprintln!("\n{}", report::generate_console_summary(&report));
        for (key, error) in unavailable_endpoints(&result) {
            eprintln!("   ⚠️  {}: {}", key, error);
        }
    }

    if args.fail_on_partial && result.is_partial() {
        eprintln!(
            "\n⛔ {} endpoint(s) unavailable. Failing (exit code 2).",
            result.unavailable_count()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: show what each endpoint would receive, exit.
fn handle_dry_run(config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: no requests will be sent.\n");

    for endpoint in &config.endpoints {
        let target = endpoint
            .url()
            .unwrap_or_else(|| "(no URL configured)".to_string());
        println!("   📡 {} [{}]", endpoint.display_name(), endpoint.key);
        println!("      {} {}", endpoint.method, target);
        println!("      {}", endpoint.describe_request());
    }

    let unconfigured = config
        .endpoints
        .iter()
        .filter(|e| e.url().is_none())
        .count();
    if unconfigured > 0 {
        println!(
            "\n   ⚠️  {} endpoint(s) have no URL and would be reported unavailable.",
            unconfigured
        );
    }

    let mut categories: Vec<_> = group_by_category(&config.endpoints)
        .into_iter()
        .map(|(category, keys)| format!("{} ({})", category, keys.len()))
        .collect();
    categories.sort();
    println!("\n   Categories: {}", categories.join(", "));

    println!("\n✅ Dry run complete. {} endpoints.", config.endpoints.len());
    Ok(0)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
