//! fleetctl - Entry Point
//!
//! Rolling deployments, rollbacks and health checks for a load-balanced
//! container fleet.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use fleetctl::app::options::{
    DeployOptions, HealthCheckOptions, RollbackOptions, DEFAULT_REGION,
};
use fleetctl::app::run::{run_deploy, run_health_check, run_rollback, HealthCheckOutcome};
use fleetctl::app::settings::{Settings, CONFIG_ENV};
use fleetctl::deploy::OrchestrationReport;
use fleetctl::logs::{init_logging, LogOptions};
use fleetctl::models::Environment;
use fleetctl::shutdown::{self, Shutdown};
use fleetctl::utils::version_info;

#[derive(Parser)]
#[command(
    name = "fleetctl",
    about = "Rolling deployment and rollback orchestrator",
    disable_version_flag = true
)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Print version information and exit
    #[arg(long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll a new image out to an environment
    Deploy {
        #[arg(long, value_enum)]
        environment: Environment,

        /// Application version label
        #[arg(long)]
        version: String,

        /// Container image reference
        #[arg(long)]
        image: String,

        #[arg(long, default_value = DEFAULT_REGION)]
        region: String,
    },

    /// Wait for a health endpoint, or monitor it
    HealthCheck {
        /// Health check URL
        #[arg(long)]
        url: String,

        /// Timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,

        /// Check interval in seconds
        #[arg(long, default_value_t = 10)]
        interval: u64,

        /// Continuous monitoring duration in seconds
        #[arg(long)]
        continuous: Option<u64>,

        /// Also check the metrics endpoint
        #[arg(long)]
        check_metrics: bool,
    },

    /// Return an environment to a previous image
    Rollback {
        #[arg(long, value_enum)]
        environment: Environment,

        /// Version to roll back to (default: latest successful deployment)
        #[arg(long)]
        previous_version: Option<String>,

        /// Image to roll back to
        #[arg(long)]
        image: Option<String>,

        #[arg(long, default_value = DEFAULT_REGION)]
        region: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", version_info());
        return ExitCode::SUCCESS;
    }

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    };

    match run(cli.config, command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Option<PathBuf>, command: Commands) -> anyhow::Result<bool> {
    let settings = Settings::load(config.as_deref())
        .await
        .context("Unable to read settings file")?;

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = init_logging(log_options).context("Failed to initialize logging")?;

    let (trigger, shutdown) = shutdown::channel();
    let execution = execute(settings, command, shutdown);
    tokio::pin!(execution);

    tokio::select! {
        passed = &mut execution => passed,
        _ = await_shutdown_signal() => {
            warn!("Interrupted; a refresh already started keeps running server-side");
            trigger.trigger();
            // Let the run record its outcome
            execution.await.map(|_| false)
        }
    }
}

async fn execute(
    settings: Settings,
    command: Commands,
    shutdown: Shutdown,
) -> anyhow::Result<bool> {
    match command {
        Commands::Deploy {
            environment,
            version,
            image,
            region,
        } => {
            let options = DeployOptions {
                environment,
                version,
                image,
                region,
            };
            let report = run_deploy(settings, options, shutdown)
                .await
                .context("Failed to set up the deployment")?;
            print_report(&report);
            Ok(report.succeeded())
        }

        Commands::Rollback {
            environment,
            previous_version,
            image,
            region,
        } => {
            let options = RollbackOptions {
                environment,
                previous_version,
                image,
                region,
            };
            let report = run_rollback(settings, options, shutdown)
                .await
                .context("Failed to set up the rollback")?;
            print_report(&report);
            Ok(report.succeeded())
        }

        Commands::HealthCheck {
            url,
            timeout,
            interval,
            continuous,
            check_metrics,
        } => {
            let options = HealthCheckOptions {
                url,
                timeout: Duration::from_secs(timeout),
                interval: Duration::from_secs(interval),
                continuous: continuous.map(Duration::from_secs),
                check_metrics,
            };

            let checked = tokio::select! {
                checked = run_health_check(options) => checked,
                _ = shutdown.requested() => return Ok(false),
            };

            match checked {
                Ok(outcome) => {
                    print_health(&outcome);
                    Ok(outcome.passed())
                }
                Err(e) if e.is_failure() => {
                    println!("{} {}", "UNHEALTHY".red().bold(), e);
                    Ok(false)
                }
                Err(e) => Err(e).context("Health check failed"),
            }
        }
    }
}

fn print_report(report: &OrchestrationReport) {
    let record = &report.record;
    let summary = format!(
        "{} of {} (version {}) to {}",
        record.kind.as_str(),
        record.image,
        record.version,
        record.environment
    );

    if report.succeeded() {
        println!("{} {}", "SUCCESS".green().bold(), summary);
    } else {
        println!(
            "{} {}: {}",
            record.status.as_str().to_uppercase().red().bold(),
            summary,
            report.reason.as_deref().unwrap_or("unknown reason")
        );
    }

    match (&report.record_key, &report.history_error) {
        (Some(key), _) => println!("  record: {}", key),
        (None, Some(e)) => println!("  {} {}", "record not saved:".yellow(), e),
        (None, None) => {}
    }
    println!("  run id: {}", report.run_id);
}

fn print_health(outcome: &HealthCheckOutcome) {
    match outcome {
        HealthCheckOutcome::Healthy {
            metrics_available, ..
        } => {
            println!("{} endpoint is healthy", "HEALTHY".green().bold());
            match metrics_available {
                Some(true) => println!("  metrics endpoint available"),
                Some(false) => println!("  {}", "metrics endpoint unavailable".yellow()),
                None => {}
            }
        }
        HealthCheckOutcome::Monitored(report) => {
            let rate = format!("{:.2}%", report.success_rate());
            if report.passed() {
                println!(
                    "{} {} of {} checks passed ({})",
                    "PASSED".green().bold(),
                    report.total_checks - report.failed_checks,
                    report.total_checks,
                    rate
                );
            } else {
                println!(
                    "{} {} of {} checks failed ({})",
                    "FAILED".red().bold(),
                    report.failed_checks,
                    report.total_checks,
                    rate
                );
            }
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, stopping...");
                    }
                    _ = ctrl_c() => {
                        info!("Ctrl+C received, stopping...");
                    }
                }
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {}", e);
                ctrl_c().await;
                info!("Ctrl+C received, stopping...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Ctrl+C received, stopping...");
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
