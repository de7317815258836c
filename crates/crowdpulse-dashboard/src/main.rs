//! `CrowdPulse` terminal dashboard
//!
//! Logs in to the analytics backend and shows site occupancy, footfall,
//! dwell time and demographics, with live updates pushed over a websocket.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use clap::{Parser, Subcommand};
use crowdpulse_core::{Config, Result, init_logging};
use crowdpulse_dashboard::{AppState, runner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Command line interface for the `CrowdPulse` dashboard
#[derive(Parser)]
#[command(
    name = "crowdpulse",
    version = env!("CARGO_PKG_VERSION"),
    about = "Crowd and occupancy analytics dashboard",
    long_about = "Terminal dashboard for a crowd monitoring backend: live occupancy, footfall, dwell time, demographics, alerts and entry/exit records."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable structured JSON logging
    #[arg(long, global = true)]
    json: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Email address or login id
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long, env = "CROWDPULSE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// Show the occupancy dashboard
    Dashboard {
        /// Keep running with live updates until Ctrl+C
        #[arg(short, long)]
        watch: bool,
    },

    /// List entry/exit records
    Entries {
        /// Page to show (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Records per page (overrides config)
        #[arg(long)]
        page_size: Option<u32>,

        /// Keep running and show live alerts until Ctrl+C
        #[arg(short, long)]
        watch: bool,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if it exists (for development convenience)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Note: .env file not loaded: {e}");
        }
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {}", e.user_message().unwrap_or(&e.to_string()));
            if e.is_auth_failure() {
                eprintln!("Run `crowdpulse login` to start a new session.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let format = if cli.json { "json" } else { config.logging.format.as_str() };
    let _guard = init_logging(level, format, config.logging.file.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.api.base_url,
        "CrowdPulse starting"
    );

    if let Commands::Config { show } = cli.command {
        println!("Configuration is valid");
        if show {
            println!("{}", runner::show_config(&config)?);
        }
        return Ok(());
    }

    let state = AppState::new(config)?;
    match cli.command {
        Commands::Login { email, password } => {
            println!("{}", runner::login(&state, &email, &password).await?);
        }
        Commands::Logout => println!("{}", runner::logout(&state)?),
        Commands::Status => println!("{}", runner::status(&state)),
        Commands::Dashboard { watch: false } => {
            println!("{}", runner::dashboard_once(&state).await?);
        }
        Commands::Dashboard { watch: true } => runner::watch_dashboard(&state).await?,
        Commands::Entries {
            page,
            page_size,
            watch: false,
        } => {
            println!("{}", runner::entries(&state, page, page_size).await?);
        }
        Commands::Entries {
            page,
            page_size,
            watch: true,
        } => runner::watch_entries(&state, page, page_size).await?,
        Commands::Config { .. } => {}
    }
    Ok(())
}
