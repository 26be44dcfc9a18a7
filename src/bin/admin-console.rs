//! # Admin Console CLI
//!
//! Runs a health check or an auto-recovery from the command line, through the
//! same guarded operation path the GUI uses.
//!
//! Exit codes: 0 healthy / fully recovered, 1 degraded / partially
//! recovered, 2 unhealthy / nothing recovered / error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use admin_console::config::ConsoleConfig;
use admin_console::console::{AdminConsole, Collaborators};
use admin_console::health::{HealthCheckResult, HealthStatus};
use admin_console::logging::{self, LoggingOptions};
use admin_console::platform::SystemctlServiceControl;
use admin_console::recovery::RecoveryResult;
use admin_console::ConsoleError;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;

#[derive(Parser)]
#[command(name = "admin-console")]
#[command(about = "Check server health and recover stopped services")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (default: config/admin_console.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write JSON logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Give up (and cancel the operation) after this many seconds
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured probe and report the aggregated status
    Health {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restart stopped critical services in dependency order
    Recover {
        /// Print the recovery result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init_with(&LoggingOptions {
        log_dir: cli.log_dir.clone(),
        verbosity: cli.verbose,
    });

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "admin-console failed");
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<u8, ConsoleError> {
    let config = ConsoleConfig::load_from(cli.config.as_deref())?;
    let console = AdminConsole::new(
        config,
        Collaborators::new(Arc::new(SystemctlServiceControl::new())),
    )?;

    let timeout = Duration::from_secs(cli.timeout);
    let code = match cli.command {
        Commands::Health { json } => console.check_health_within(timeout).and_then(|report| {
            print_health(&report, json)?;
            Ok(health_exit_code(&report))
        }),
        Commands::Recover { json } => console.recover_within(timeout).and_then(|result| {
            print_recovery(&result, json)?;
            Ok(recovery_exit_code(&result))
        }),
    };

    console.shutdown();
    code
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ConsoleError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn print_health(report: &HealthCheckResult, json: bool) -> Result<(), ConsoleError> {
    if json {
        return print_json(report);
    }

    println!("{}", report.summary());
    for issue in report.issues() {
        println!("  [issue]   {issue}");
    }
    for warning in report.warnings() {
        println!("  [warning] {warning}");
    }
    Ok(())
}

fn print_recovery(result: &RecoveryResult, json: bool) -> Result<(), ConsoleError> {
    if json {
        return print_json(result);
    }

    println!("{}", result.summary());
    for (label, services) in [
        ("already running", &result.already_running),
        ("recovered", &result.recovered),
        ("failed", &result.failed),
    ] {
        if !services.is_empty() {
            println!("  {label}: {}", services.join(", "));
        }
    }
    Ok(())
}

fn health_exit_code(report: &HealthCheckResult) -> u8 {
    match report.overall() {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded => 1,
        HealthStatus::Unhealthy => 2,
    }
}

fn recovery_exit_code(result: &RecoveryResult) -> u8 {
    if result.success {
        0
    } else if !result.recovered.is_empty() {
        1
    } else {
        2
    }
}
