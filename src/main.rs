//! errand - queue natural-language work for an external agent.
//!
//! Usage:
//!   errand serve [--config FILE]        Run the HTTP API and the worker
//!   errand run --config FILE QUERY      Run one query and print the task
//!   errand validate --config FILE       Validate a configuration file

use clap::{Parser, Subcommand};
use errand::api::{self, ApiConfig, TaskDetailResponse};
use errand::{ConfigLoader, ErrandConfig, EventBus, EventHandler, InMemoryStorage, Orchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// errand - queue natural-language work for an external agent
#[derive(Parser)]
#[command(name = "errand")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the background worker
    Serve {
        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Agent timeout in seconds (overrides the config file)
        #[arg(short = 't', long)]
        timeout_secs: Option<u64>,
    },

    /// Submit one query, wait for it to finish, and print the task as JSON
    Run {
        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// The natural-language request
        #[arg(value_name = "QUERY")]
        query: String,

        /// Agent timeout in seconds (overrides the config file)
        #[arg(short = 't', long)]
        timeout_secs: Option<u64>,
    },

    /// Validate a configuration file without running
    Validate {
        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
}

/// Simple logging event handler that prints task events.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &errand::Event) {
        match event {
            errand::Event::TaskQueued { task_id, .. } => {
                info!("Task '{}' queued", task_id);
            }
            errand::Event::TaskStarted { task_id, .. } => {
                info!("Task '{}' started", task_id);
            }
            errand::Event::TaskCompleted {
                task_id, duration, ..
            } => {
                info!("Task '{}' completed in {:?}", task_id, duration);
            }
            errand::Event::TaskFailed {
                task_id,
                error,
                timed_out,
                duration,
                ..
            } => {
                if *timed_out {
                    warn!("Task '{}' timed out after {:?}", task_id, duration);
                } else {
                    error!("Task '{}' failed after {:?}: {}", task_id, duration, error);
                }
            }
        }
    }
}

/// Event handler that signals when any task reaches a terminal state.
struct CompletionWatcher {
    completed: Arc<tokio::sync::Notify>,
}

#[async_trait::async_trait]
impl EventHandler for CompletionWatcher {
    async fn handle(&self, event: &errand::Event) {
        if matches!(
            event,
            errand::Event::TaskCompleted { .. } | errand::Event::TaskFailed { .. }
        ) {
            self.completed.notify_one();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            timeout_secs,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => ErrandConfig::default(),
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(secs) = timeout_secs {
                config.execution.timeout_secs = secs;
            }
            ConfigLoader::validate(&config)?;
            serve(config).await?;
        }
        Commands::Run {
            config,
            query,
            timeout_secs,
        } => {
            let mut config = load_config(&config)?;
            if let Some(secs) = timeout_secs {
                config.execution.timeout_secs = secs;
            }
            ConfigLoader::validate(&config)?;
            run_once(config, query).await?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ErrandConfig, Box<dyn std::error::Error>> {
    info!("Loading configuration from: {}", path.display());
    Ok(ConfigLoader::from_file(path)?)
}

/// Run the HTTP API and the worker until Ctrl+C.
async fn serve(config: ErrandConfig) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = config.build_supervisor()?;

    // Create event bus with logging handler
    let event_bus = Arc::new(EventBus::new());
    event_bus.register(Arc::new(LoggingHandler)).await;

    let orchestrator = Orchestrator::new(InMemoryStorage::new()).with_event_bus(event_bus);
    let (worker, worker_task) = orchestrator.start(supervisor);

    let state = api::create_api_state(orchestrator, worker.clone());
    let server_task = api::start_server(ApiConfig::from(&config.server), state).await?;

    info!(
        "Agent timeout: {}s, shutdown mode: {:?}",
        config.execution.timeout_secs, config.worker.shutdown
    );
    info!("Press Ctrl+C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            worker.shutdown(config.worker.shutdown).await?;
            if let Err(e) = worker_task.await {
                error!("Worker task failed: {}", e);
            }
        }
        _ = server_task => {
            warn!("API server stopped");
            worker.shutdown(config.worker.shutdown).await?;
        }
    }

    info!("Goodbye!");
    Ok(())
}

/// Submit one query and wait for it to finish.
async fn run_once(config: ErrandConfig, query: String) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = config.build_supervisor()?;

    // Create event bus with logging and completion watching handlers
    let event_bus = Arc::new(EventBus::new());
    event_bus.register(Arc::new(LoggingHandler)).await;

    let completed = Arc::new(tokio::sync::Notify::new());
    let watcher = CompletionWatcher {
        completed: completed.clone(),
    };
    event_bus.register(Arc::new(watcher)).await;

    let orchestrator = Orchestrator::new(InMemoryStorage::new()).with_event_bus(event_bus);
    let (worker, worker_task) = orchestrator.start(supervisor);

    let id = orchestrator.submit(&query).await?;
    info!("Submitted task '{}'", id);

    completed.notified().await;

    let task = orchestrator.get_task(&id).await?;
    let failed = task.status == errand::TaskStatus::Failed;
    println!(
        "{}",
        serde_json::to_string_pretty(&TaskDetailResponse::from(task))?
    );

    worker.shutdown(errand::ShutdownMode::Drain).await?;
    worker_task.await?;

    if failed {
        return Err(format!("task '{}' failed", id).into());
    }
    info!("Done!");
    Ok(())
}

/// Validate a configuration file without running.
fn validate_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating configuration: {}", path.display());

    match ConfigLoader::from_file(&path) {
        Ok(config) => {
            info!("Configuration is valid:");
            info!("  server: {}", config.bind_address());
            match &config.agent.program {
                Some(program) => info!("  agent: {} {}", program, config.agent.args.join(" ")),
                None => warn!("  agent: no program configured, `serve` and `run` will refuse to start"),
            }
            info!(
                "  execution: timeout {}s, cancel grace {}s",
                config.execution.timeout_secs, config.execution.cancel_grace_secs
            );
            info!("  worker: shutdown {:?}", config.worker.shutdown);
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}
