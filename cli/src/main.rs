//! wasctl - stop, start and sync WebSphere nodes over SSH
//!
//! Resolves an environment and subsystem from the built-in inventory,
//! runs one action across its hosts and alerts on anything it cannot
//! confirm.

use clap::{Args, Parser, Subcommand};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wasctl_core::status::FATAL_RC;
use wasctl_core::{
    check_status, describe, inventory, Action, ActionController, Collaborators, CommandRunner,
    Error, NativeSshRunner, NotificationAlerter, NotificationManager, RemoteExecutor, RunReport,
    Severity, SshSettings, SshTransport, SubsystemKind, SystemClock, TokioPacer,
};

mod config;

use config::Config;

/// wasctl - WebSphere node orchestration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (TOML); environment variables otherwise
    #[arg(short, long, env = "WASCTL_CONFIG", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an action against a subsystem
    Run(RunArgs),

    /// Print the resolved subsystem descriptor as JSON
    Show(Target),
}

#[derive(Args, Debug)]
struct Target {
    /// Environment: prd1, prd2 or stg
    #[arg(short, long)]
    env: String,

    /// Subsystem: application (wc) or search (solr)
    #[arg(short, long)]
    subsystem: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    target: Target,

    /// Action: stop, start or sync
    #[arg(short, long)]
    action: String,

    /// Seconds to wait between server start and the JVM check
    #[arg(short, long)]
    grace_period: Option<u64>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing; RUST_LOG may come from .env
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(None))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => handle_run(cli.config.as_deref(), args).await,
        Commands::Show(target) => handle_show(target),
    };

    if let Err(e) = result {
        let code = e.downcast_ref::<Error>().map_or(1, Error::exit_code);
        error!("Command failed: {:#}", e);
        process::exit(code);
    }
}

/// Load `.env` (or `dotenv_path`), then build the log filter from `RUST_LOG`
fn log_filter(dotenv_path: Option<&Path>) -> EnvFilter {
    match dotenv_path {
        Some(path) => {
            let _ = dotenvy::from_path(path);
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Pass a result through, turning an error into the fatal status
fn require<T>(result: wasctl_core::Result<T>) -> wasctl_core::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            check_status(FATAL_RC, &e.to_string(), Severity::Error)?;
            Err(e)
        }
    }
}

fn build_runner(settings: &SshSettings) -> Arc<dyn CommandRunner> {
    match settings.transport {
        SshTransport::OpenSsh => Arc::new(RemoteExecutor::new(settings.clone())),
        SshTransport::Native => Arc::new(NativeSshRunner::new(settings.clone())),
    }
}

async fn handle_run(config_path: Option<&str>, args: RunArgs) -> anyhow::Result<()> {
    let config = require(Config::load(config_path))?;
    let env = require(inventory::resolve(&args.target.env))?;
    let kind: SubsystemKind = require(args.target.subsystem.parse())?;
    let action: Action = require(args.action.parse())?;
    let desc = require(describe(kind, &env))?;

    let runner = build_runner(&config.ssh);
    let manager = NotificationManager::from_settings(reqwest::Client::new(), &config.alerting);
    info!(
        env = %env.name,
        subsystem = %kind,
        action = %action,
        runner = runner.name(),
        alert_backends = ?manager.backend_names(),
        "Starting run"
    );

    let collab = Collaborators::new(
        runner,
        Arc::new(TokioPacer),
        Arc::new(SystemClock),
        Arc::new(NotificationAlerter::new(env.name, manager)),
    );
    let controller = ActionController::new(collab, config.timings.clone());
    let report = controller
        .execute(&desc, action, args.grace_period.map(Duration::from_secs))
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    summarize(env.name.as_str(), &report)?;
    Ok(())
}

/// Final status lines; unconfirmed hosts do not change the exit code
fn summarize(env: &str, report: &RunReport) -> wasctl_core::Result<()> {
    let subject = format!("{} {} on {}", report.action, report.subsystem, env);

    if report.is_clean() {
        check_status(0, &format!("{} completed", subject), Severity::Info)?;
    } else {
        check_status(
            0,
            &format!(
                "{} finished with {} alert(s); manual action required",
                subject,
                report.alerts.len()
            ),
            Severity::Warning,
        )?;
    }

    if report.failed_deliveries > 0 {
        check_status(
            0,
            &format!("{} alert(s) could not be delivered", report.failed_deliveries),
            Severity::Error,
        )?;
    }
    Ok(())
}

fn handle_show(target: Target) -> anyhow::Result<()> {
    let env = require(inventory::resolve(&target.env))?;
    let kind: SubsystemKind = require(target.subsystem.parse())?;
    let desc = require(describe(kind, &env))?;

    println!("{}", serde_json::to_string_pretty(&desc)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "wasctl", "run", "-e", "stg", "-s", "application", "-a", "start", "-g", "60",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.target.env, "stg");
                assert_eq!(args.action, "start");
                assert_eq!(args.grace_period, Some(60));
                assert!(!args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_names_are_fatal() {
        let err = require(inventory::resolve("prd3")).unwrap_err();
        assert!(matches!(err, Error::Fatal { code: 1, .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_alerts_do_not_fail_the_run() {
        let mut report = RunReport::new(SubsystemKind::Application, Action::Start);
        report.alerts.push(wasctl_core::Alert::new(
            "stgsrv601",
            wasctl_core::AlertReason::NodeAgentDown,
        ));
        report.failed_deliveries = 1;
        assert!(summarize("stg", &report).is_ok());
    }

    #[test]
    fn test_build_runner_follows_transport() {
        let native = SshSettings {
            transport: SshTransport::Native,
            ..SshSettings::default()
        };
        assert_eq!(build_runner(&native).name(), "native");
        assert_eq!(build_runner(&SshSettings::default()).name(), "openssh");
    }

    #[test]
    fn test_log_filter_reads_dotenv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "RUST_LOG=wasctl=debug").unwrap();
        std::env::remove_var("RUST_LOG");

        let filter = log_filter(Some(file.path()));
        assert_eq!(filter.to_string(), "wasctl=debug");
        std::env::remove_var("RUST_LOG");
    }
}
