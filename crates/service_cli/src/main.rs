//! Binding CLI - Command Line Driver for the Notification Graph
//!
//! Builds small object graphs from the bridged roles and reports how
//! notifications and lazy recalculation flow through them.
//!
//! # Commands
//!
//! - `binding scenario` - Price a cash flow strip, bump the rate and move the evaluation date
//! - `binding check` - Print the override table of each bridged class
//!
//! # Configuration
//!
//! Settings come from defaults, then `--config <file>`, then `BINDING_*`
//! environment variables, then command-line flags. `RUST_LOG` overrides the
//! configured log level.

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use binding_core::config::{build_config, CliArgs};

mod commands;
mod error;

pub use error::{CliError, Result};

/// Notification graph driver
#[derive(Parser)]
#[command(name = "binding")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Evaluation date (YYYY-MM-DD); defaults to today
    #[arg(short, long, global = true)]
    evaluation_date: Option<String>,

    /// Lazy objects forward only the first notification after a calculation
    #[arg(long, global = true)]
    forward_first_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a cash flow strip and show recalculation counts
    Scenario {
        /// Flat forward rate quoted at start
        #[arg(short, long, default_value = "0.05")]
        rate: f64,

        /// Rate after the bump
        #[arg(short, long, default_value = "0.04")]
        bumped: f64,

        /// Days between evaluation and curve reference date
        #[arg(short, long, default_value = "0")]
        settlement_days: i64,

        /// Number of annual coupons
        #[arg(short, long, default_value = "5")]
        years: u32,

        /// Annual coupon rate on a notional of 100
        #[arg(long, default_value = "0.05")]
        coupon: f64,
    },

    /// Print the override table of each bridged class
    Check {
        /// Restrict the output to one class
        #[arg(long)]
        class: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config_file: cli.config.clone(),
        log_level: if cli.verbose && cli.log_level.is_none() {
            Some("debug".to_string())
        } else {
            cli.log_level.clone()
        },
        evaluation_date: cli.evaluation_date.clone(),
        forward_first_notification_only: cli.forward_first_only,
    };
    let config = build_config(&args)?;

    // Initialise tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter_str()));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    if cli.verbose {
        info!("Verbose mode enabled");
    }
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Scenario {
            rate,
            bumped,
            settlement_days,
            years,
            coupon,
        } => commands::scenario::run(&config, rate, bumped, settlement_days, years, coupon),
        Commands::Check { class } => commands::check::run(class.as_deref()),
    }
}
