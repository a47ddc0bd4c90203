//! JobRadar pipeline driver
//!
//! `jobradar run --mode=all|etl|matching` runs scheduled cycles until
//! terminated. Exit code is non-zero only on unrecoverable startup failure
//! (missing/invalid config, unreachable database).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};

use jobradar::ai::client::ExtractionClient;
use jobradar::ai::openai::OpenAiProvider;
use jobradar::config::load_config;
use jobradar::db::{database_path_from_url, init_database, open_connection};
use jobradar::logging::{init_logging, setup_panic_hook};
use jobradar::notify::service::NotificationService;
use jobradar::orchestrator::{Orchestrator, PipelineMode, StopSignal};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    All,
    Etl,
    Matching,
}

impl From<Mode> for PipelineMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::All => PipelineMode::All,
            Mode::Etl => PipelineMode::Etl,
            Mode::Matching => PipelineMode::Matching,
        }
    }
}

#[derive(Parser)]
#[command(name = "jobradar", about = "AI-powered job matching pipeline")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pipeline cycles on the configured schedule
    Run {
        /// Which pipeline phases to run each cycle
        #[arg(long, value_enum, default_value = "all")]
        mode: Mode,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    init_logging(level);
    setup_panic_hook();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    // Fatal startup check: the store must be reachable and migrated
    let db_path = database_path_from_url(&config.database.url);
    match open_connection(&db_path) {
        Ok(conn) => {
            if let Err(e) = init_database(&conn) {
                log::error!("Database migration failed: {}", e);
                return ExitCode::from(1);
            }
        }
        Err(e) => {
            log::error!("Cannot connect to database at {}: {}", db_path.display(), e);
            return ExitCode::from(1);
        }
    }

    let Command::Run { mode } = cli.command;
    let mode: PipelineMode = mode.into();
    log::info!("Main driver starting in {:?} mode", mode);

    let stop = StopSignal::new();
    spawn_signal_handler(stop.clone());

    let provider = Arc::new(OpenAiProvider::new(&config.etl.llm));
    let client = ExtractionClient::new(provider);

    let notifications = if config.notifications.enabled {
        let service = Arc::new(
            NotificationService::new(db_path.clone(), config.notifications.clone()).await,
        );
        if service.async_mode() {
            // Long-lived worker pool consuming the queue
            service.spawn_workers(2, &stop);
        }
        Some(service)
    } else {
        None
    };

    let interval = Duration::from_secs(config.schedule.interval_seconds);
    let orchestrator = Orchestrator::new(config, client, notifications);

    let mut cycle_count: u64 = 0;
    while !stop.is_set() {
        cycle_count += 1;
        log::info!("=== Starting cycle #{} ({:?}) ===", cycle_count, mode);
        let cycle_start = Instant::now();

        match orchestrator.run_cycle(mode, &stop).await {
            Ok(report) => {
                log::info!(
                    "=== Cycle #{} completed in {:.1}s: gathered={} extracted={} embedded={} \
                     facets={}/{} matches={} saved={} notified={}{} ===",
                    cycle_count,
                    cycle_start.elapsed().as_secs_f64(),
                    report.jobs_gathered,
                    report.jobs_extracted,
                    report.jobs_embedded,
                    report.facets.processed,
                    report.facets.processed + report.facets.failed,
                    report.matches_scored,
                    report.matches_saved,
                    report.notifications_sent,
                    if report.interrupted { " (interrupted)" } else { "" },
                );
            }
            Err(e) => {
                log::error!("Error in cycle #{}: {}", cycle_count, e);
            }
        }

        if stop.is_set() {
            break;
        }
        log::info!("Sleeping {}s until next cycle...", interval.as_secs());
        stop.wait(interval).await;
    }

    log::info!("Shutdown complete");
    ExitCode::SUCCESS
}

fn spawn_signal_handler(stop: StopSignal) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        log::info!("Shutdown signal received");
        stop.set();
    });
}
