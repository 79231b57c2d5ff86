//! DevLab operator CLI
//!
//! Drives the scenario lifecycle manager from the command line and hosts the
//! cleanup worker.
//!
//! # Configuration
//!
//! 1. Environment variables (highest priority, see [`config`])
//! 2. TOML file given with `--config`
//! 3. Default values
//!
//! Results are printed to stdout as JSON. Logs go to stderr.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::DevlabConfig;
use devlab_cleanup::CleanupWorker;
use devlab_core::{ScenarioError, ScenarioManager};
use devlab_runtime::{ContainerRuntime, DockerRuntime, InMemoryRuntime};
use devlab_store::{ScenarioStore, StoreConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type Manager = ScenarioManager<dyn ContainerRuntime, dyn ScenarioStore>;
type Worker = CleanupWorker<dyn ContainerRuntime, dyn ScenarioStore>;

/// DevLab scenario lifecycle manager
#[derive(Parser, Debug)]
#[command(name = "devlab")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "DEVLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive (overrides RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Use the in-memory runtime and store instead of Docker and SQLite
    #[arg(long)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the cleanup worker until Ctrl-C
    Worker,
    /// Run one cleanup cycle and print its report
    Sweep,
    /// Provision a new scenario
    Start {
        /// Owner of the scenario
        #[arg(long)]
        user: String,
        /// Scenario type, e.g. `go` or `k8s`
        #[arg(long = "type", value_name = "TYPE")]
        scenario_type: String,
        /// Shell script run inside the sandbox after the terminal is up
        #[arg(long)]
        script: Option<String>,
    },
    /// Reconcile and print a scenario's status
    Status {
        /// Scenario ID
        id: String,
    },
    /// Print the terminal URL of a running scenario
    Terminal {
        /// Scenario ID
        id: String,
    },
    /// Stop a scenario and remove its container
    Stop {
        /// Scenario ID
        id: String,
    },
    /// Print the workspace tree of a scenario
    Tree {
        /// Scenario ID
        id: String,
    },
    /// List known scenario types
    Types,
    /// List a user's scenarios
    List {
        /// Owner to list
        #[arg(long)]
        user: String,
    },
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    status: u16,
    retryable: bool,
    message: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&args);

    let mut config = DevlabConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if args.in_memory {
        config.store = StoreConfig::memory();
    }
    debug!(?config, "configuration resolved");

    let runtime = open_runtime(&config, args.in_memory).await?;
    let store = config
        .store
        .open()
        .with_context(|| format!("failed to open {:?} store", config.store.backend))?;
    info!(runtime = runtime.name(), store = store.name(), "backends ready");

    let manager: Manager = ScenarioManager::new(
        Arc::clone(&runtime),
        Arc::clone(&store),
        config.manager.clone(),
    )
    .with_catalog(config.runtime.catalog.clone());
    let worker: Worker = CleanupWorker::new(runtime, store, config.worker.clone());

    match args.command {
        Command::Worker => {
            run_worker(&worker).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sweep => print_json(&worker.run_once().await),
        Command::Start {
            user,
            scenario_type,
            script,
        } => finish(manager.start_scenario(&user, &scenario_type, script).await),
        Command::Status { id } => finish(manager.get_scenario_status(&id).await),
        Command::Terminal { id } => finish(manager.get_terminal_url(&id).await),
        Command::Stop { id } => finish(
            manager
                .stop_scenario(&id)
                .await
                .map(|()| serde_json::json!({ "scenario_id": id, "status": "stopped" })),
        ),
        Command::Tree { id } => finish(manager.get_directory_structure(&id).await),
        Command::Types => print_json(&manager.list_scenario_types()),
        Command::List { user } => finish(manager.list_scenarios(&user).await),
    }
}

fn init_tracing(args: &Args) {
    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_runtime(config: &DevlabConfig, in_memory: bool) -> Result<Arc<dyn ContainerRuntime>> {
    if in_memory {
        return Ok(Arc::new(InMemoryRuntime::with_config(&config.runtime)));
    }
    let docker = DockerRuntime::connect(&config.runtime).context("failed to connect to Docker")?;
    docker.ping().await.context("Docker engine is not responding")?;
    Ok(Arc::new(docker))
}

async fn run_worker(worker: &Worker) {
    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        shutdown.cancel();
    });
    worker.run(token).await;
}

/// Print a manager result; failures become a JSON error object and exit code 1
fn finish<T: Serialize>(result: Result<T, ScenarioError>) -> Result<ExitCode> {
    match result {
        Ok(value) => print_json(&value),
        Err(err) => {
            let kind = err.kind();
            let output = ErrorOutput {
                error: kind.as_str(),
                status: kind.http_status(),
                retryable: err.is_retryable(),
                message: err.to_string(),
            };
            print_json(&output)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<ExitCode> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn start_parses_type_flag() {
        let args = Args::try_parse_from([
            "devlab", "--in-memory", "start", "--user", "alice", "--type", "k8s",
        ])
        .unwrap();
        assert!(args.in_memory);
        match args.command {
            Command::Start {
                user,
                scenario_type,
                script,
            } => {
                assert_eq!(user, "alice");
                assert_eq!(scenario_type, "k8s");
                assert!(script.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn id_commands_require_an_id() {
        assert!(Args::try_parse_from(["devlab", "status"]).is_err());
        assert!(Args::try_parse_from(["devlab", "tree", "scn-1"]).is_ok());
    }
}
