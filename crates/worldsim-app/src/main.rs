use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use worldsim_app::Console;
use worldsim_app::commands::{self, CreateOptions};
use worldsim_core::config::DEFAULT_BASE_URL;
use worldsim_core::setup::{DEFAULT_DURATION_HOURS, DEFAULT_TICK_INTERVAL_MINUTES};
use worldsim_core::{ApiKeys, ClientConfig, EventFilter, HttpSimulationApi, SimulationId};

#[derive(Parser, Debug)]
#[command(
    name = "worldsim",
    version,
    about = "Create, steer, and watch remote world simulations"
)]
struct Cli {
    /// Base URL of the simulation backend.
    #[arg(long, env = "WORLDSIM_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Write logs to this file (the console otherwise stays silent).
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive console (default).
    Console,
    /// Create a simulation and print its id.
    Create {
        /// Overseer provider key.
        #[arg(long)]
        overseer: String,
        /// Leader provider key; repeat for each leader (1 to 5).
        #[arg(long = "leader", required = true)]
        leaders: Vec<String>,
        #[arg(long)]
        thinker: Option<String>,
        #[arg(long)]
        strategist: Option<String>,
        /// Wall-clock duration of the run.
        #[arg(
            long,
            default_value_t = DEFAULT_DURATION_HOURS,
            value_parser = clap::value_parser!(u32).range(1..=168)
        )]
        duration_hours: u32,
        /// Minutes between ticks.
        #[arg(
            long,
            default_value_t = DEFAULT_TICK_INTERVAL_MINUTES,
            value_parser = clap::value_parser!(u32).range(1..=60)
        )]
        tick_interval: u32,
    },
    /// Pause a running simulation.
    Pause { id: String },
    /// Resume a paused simulation.
    Resume { id: String },
    /// Fetch the final report as JSON.
    Report { id: String },
    /// List simulations known to the backend.
    List,
    /// Check backend health.
    Health,
    /// Print a summary of the current world state.
    State { id: String },
    /// Print the event chronicle.
    Logs {
        id: String,
        /// Number of most recent entries to request.
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Only show one event type (e.g. WAR, ALLIANCE, COLLAPSE).
        #[arg(long)]
        filter: Option<String>,
    },
    /// Open the live panels for an existing simulation.
    Watch { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Console);
    let interactive = matches!(command, Command::Console | Command::Watch { .. });
    init_tracing(cli.log_file.as_deref(), interactive)?;

    let config = ClientConfig::from_env().with_base_url(cli.base_url);
    let api = HttpSimulationApi::new(&config).context("failed to build HTTP client")?;
    info!(base_url = api.base_url(), "using simulation backend");

    match command {
        Command::Console => Console::new(Arc::new(api), config).run().await?,
        Command::Watch { id } => {
            Console::new(Arc::new(api), config)
                .watching(SimulationId::from(id))
                .run()
                .await?
        }
        Command::Create {
            overseer,
            leaders,
            thinker,
            strategist,
            duration_hours,
            tick_interval,
        } => {
            let options = CreateOptions {
                keys: ApiKeys {
                    overseer,
                    leaders,
                    thinker,
                    strategist,
                },
                duration_hours,
                tick_interval_minutes: tick_interval,
            };
            commands::create_command(&api, options).await?
        }
        Command::Pause { id } => commands::pause_command(&api, &id.into()).await?,
        Command::Resume { id } => commands::resume_command(&api, &id.into()).await?,
        Command::Report { id } => commands::report_command(&api, &id.into()).await?,
        Command::List => commands::list_command(&api).await?,
        Command::Health => commands::health_command(&api).await?,
        Command::State { id } => commands::state_command(&api, &id.into()).await?,
        Command::Logs { id, limit, filter } => {
            let filter = filter
                .as_deref()
                .map(EventFilter::parse)
                .unwrap_or_default();
            commands::logs_command(&api, &id.into(), limit, &filter).await?
        }
    }

    Ok(())
}

/// One-shot commands log to stderr; the interactive console only logs when a
/// file is given, since stderr would draw over the screen.
fn init_tracing(log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None if interactive => {}
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}
