//! oncall-scheduler: monthly on-call constraint cycle daemon.
//!
//! Usage:
//!   oncall-scheduler [--config config/scheduler.toml] [run [--check-now]]
//!   oncall-scheduler phase [--date 2026-03-30]
//!   oncall-scheduler reset

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use oncall_core::{Config, CycleMonth};
use oncall_notify::Dispatcher;
use oncall_scheduler::{
    days_left, expected_cycle, resolve_phase, run_daemon, Clock, DailyTrigger, Orchestrator,
    ProcessCollectionService, ProcessGenerationInvoker, SystemClock, Zone,
};
use oncall_store::{ConstraintFile, CycleStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oncall-scheduler", version, about = "Monthly on-call constraint cycle daemon")]
struct Cli {
    /// Path to the scheduler TOML config.
    #[arg(long, global = true, env = "ONCALL_CONFIG", default_value = "config/scheduler.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (default).
    Run {
        /// Also run a daily check immediately after startup.
        #[arg(long)]
        check_now: bool,
    },
    /// Print the cycle phase for a date (today by default).
    Phase {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Advance the constraint store to the next month and clear restrictions.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    oncall_core::config::load_dotenv();
    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli.config)?);
    let clock = SystemClock::new(Zone::from_config(config.trigger.time_zone()?));

    match cli.command.unwrap_or(Command::Run { check_now: false }) {
        Command::Run { check_now } => run(config, clock, check_now).await,
        Command::Phase { date } => {
            let date = date.unwrap_or_else(|| clock.now().date());
            let reminder_days = config.cycle.reminder_days;
            println!("date:           {date} ({} time zone)", clock.zone());
            println!("days left:      {}", days_left(date));
            println!("phase:          {:?}", resolve_phase(date, reminder_days));
            println!("target month:   {}", CycleMonth::of(date).next());
            println!("store expected: {}", expected_cycle(date, reminder_days));
            Ok(())
        }
        Command::Reset => {
            let store = ConstraintFile::new(&config.store.path);
            let cycle = store.advance_cycle_and_clear_restrictions()?;
            info!(%cycle, path = %config.store.path.display(), "manual reset complete");
            Ok(())
        }
    }
}

async fn run(config: Arc<Config>, clock: SystemClock, check_now: bool) -> anyhow::Result<()> {
    info!("oncall-scheduler starting");
    config.log_summary();

    let trigger = DailyTrigger::parse(&config.trigger.cron, clock.zone())?;
    let mut orchestrator = Orchestrator::new(
        config.clone(),
        ProcessCollectionService::new(config.collection_service.clone()),
        ProcessGenerationInvoker::new(config.generation.clone()),
        ConstraintFile::new(&config.store.path),
        Dispatcher::from_config(&config.cycle),
        clock,
    )?;

    run_daemon(&mut orchestrator, &trigger, check_now).await?;
    info!("oncall-scheduler stopped");
    Ok(())
}
