//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// whatif - fan a climate what-if scenario out to prediction services
///
/// Sends one scenario to every configured prediction endpoint in parallel,
/// retries failures, and reports a combined result. Can also run as an
/// HTTP API.
///
/// Examples:
///   whatif --scenario "What if global temperatures rise by 2°C?"
///   whatif -s "What if coal plants close by 2030?" --format json -o result.json
///   whatif --serve --listen 0.0.0.0:8080
///   whatif --dry-run
///   whatif --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Scenario text to send to every endpoint
    #[arg(
        short,
        long,
        value_name = "TEXT",
        required_unless_present_any = ["serve", "dry_run", "init_config"]
    )]
    pub scenario: Option<String>,

    /// Start date for time-series endpoints (defaults to today, UTC)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start_date: Option<NaiveDate>,

    /// Output file path for the report (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .whatif.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Attempts per endpoint, including the first
    #[arg(long, value_name = "COUNT")]
    pub max_attempts: Option<u32>,

    /// Delay between attempts in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Timeout for a single attempt in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run the HTTP API instead of a single aggregation
    #[arg(long, conflicts_with = "scenario")]
    pub serve: bool,

    /// Address for the HTTP API
    #[arg(long, value_name = "ADDR", env = "WHATIF_LISTEN")]
    pub listen: Option<String>,

    /// Dry run: show the request each endpoint would receive and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any endpoint ended unavailable
    ///
    /// Useful for monitoring. The report is still written.
    #[arg(long)]
    pub fail_on_partial: bool,

    /// Generate a default .whatif.toml configuration file
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
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref scenario) = self.scenario {
            if scenario.trim().is_empty() {
                return Err("Scenario must not be empty".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.max_attempts == Some(0) {
            return Err("Max attempts must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref listen) = self.listen {
            if listen.parse::<std::net::SocketAddr>().is_err() {
                return Err(format!("Invalid listen address: {}", listen));
            }
        }

        Ok(())
    }
}
