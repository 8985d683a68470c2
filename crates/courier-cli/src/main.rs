//! courier - command-line front end for courier-core.
//!
//! - `courier dispatch --tasks tasks.json` - run tasks through a local dispatcher
//! - `courier resolve` - resolve a category to a queue and endpoint
//! - `courier provision` - ensure a pipeline's queues exist
//! - `courier queues list|delete|pause|resume` - queue management
//!
//! Settings come from `COURIER_*` environment variables (a `.env` file is
//! loaded first when present).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use courier_core::domain::{OrchestrationPriority, TaskSubmission};
use courier_core::impls::{HttpAppConfigSource, ReqwestSink, build_queue_admin, build_token_provider};
use courier_core::ports::{AppConfigSource, SystemClock};
use courier_core::routing::{AppContext, PipelineDefinition, ResolverConfig};
use courier_core::{CourierConfig, Dispatcher, QueueProvisioner, QueueResolver};

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "HTTP task dispatch and queue routing")]
struct Cli {
    /// Queue location; overrides COURIER_LOCATION.
    #[arg(long, global = true)]
    location: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Submit tasks from a JSON file and dispatch them until the queue drains.
    Dispatch {
        /// JSON array of task submissions.
        #[arg(long)]
        tasks: PathBuf,
        /// Give up waiting after this many seconds.
        #[arg(long, default_value_t = 300)]
        wait_secs: u64,
    },
    /// Resolve a task category to its physical queue and endpoint.
    Resolve {
        /// Routes file (JSON).
        #[arg(long, env = "COURIER_ROUTES")]
        routes: PathBuf,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "default")]
        priority: String,
        #[arg(long)]
        app_id: String,
        /// Extra template tokens as `name=value`.
        #[arg(long = "token", value_parser = parse_token)]
        tokens: Vec<(String, String)>,
    },
    /// Ensure every queue a pipeline references exists.
    Provision {
        /// Pipeline definition (JSON).
        #[arg(long)]
        pipeline: PathBuf,
        /// App id; defaults to the pipeline's own `app_id`.
        #[arg(long)]
        app_id: Option<String>,
    },
    /// Queue management.
    Queues {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Debug, Subcommand)]
enum QueueAction {
    List,
    Delete { name: String },
    Pause { name: String },
    Resume { name: String },
}

fn parse_token(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is normal
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = CourierConfig::from_env().context("invalid COURIER_* configuration")?;
    if let Some(location) = cli.location {
        config.backend.location = location;
    }

    match cli.command {
        Commands::Dispatch { tasks, wait_secs } => {
            dispatch(&config, &tasks, Duration::from_secs(wait_secs)).await
        }
        Commands::Resolve {
            routes,
            category,
            priority,
            app_id,
            tokens,
        } => resolve(&config, &routes, &category, &priority, &app_id, tokens).await,
        Commands::Provision { pipeline, app_id } => {
            provision(&config, &pipeline, app_id.as_deref()).await
        }
        Commands::Queues { action } => queues(&config, action).await,
    }
}

async fn dispatch(config: &CourierConfig, tasks: &Path, wait: Duration) -> Result<()> {
    let raw = std::fs::read_to_string(tasks)
        .with_context(|| format!("cannot read {}", tasks.display()))?;
    let submissions: Vec<TaskSubmission> =
        serde_json::from_str(&raw).context("tasks file must be a JSON array of submissions")?;

    let tokens = build_token_provider(&config.token_provider, config.dispatcher.token_timeout)?;
    let dispatcher = Dispatcher::builder(ReqwestSink::factory())
        .config(config.dispatcher.clone())
        .token_provider(tokens)
        .build()?;

    let submitted = submissions.len() as u64;
    for submission in submissions {
        let ack = dispatcher.submit(submission).await?;
        info!(task = %ack.name, schedule_time = %ack.schedule_time, "submitted");
    }

    dispatcher.start().await?;
    let deadline = Instant::now() + wait;
    let history = dispatcher.history();
    loop {
        let settled = history.total_recorded().await;
        if settled >= submitted {
            break;
        }
        if Instant::now() >= deadline {
            warn!(settled, submitted, "timed out waiting for tasks to finish");
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                break;
            }
            _ = sleep(Duration::from_millis(250)) => {}
        }
    }
    dispatcher.stop().await;

    let status = dispatcher.status().await?;
    print_json(&status)?;
    if status.failed() > 0 {
        bail!("{} task(s) failed", status.failed());
    }
    Ok(())
}

fn build_provisioner(config: &CourierConfig) -> Result<QueueProvisioner> {
    let admin = build_queue_admin(&config.backend)?;
    let app_configs = match &config.config_service_url {
        Some(url) => Some(Arc::new(HttpAppConfigSource::new(
            url.clone(),
            config.provisioner.config_timeout,
        )?) as Arc<dyn AppConfigSource>),
        None => None,
    };
    Ok(QueueProvisioner::new(
        admin,
        app_configs,
        Arc::new(SystemClock),
        config.provisioner.clone(),
        config.backend.project.clone(),
        config.backend.location.clone(),
    ))
}

async fn resolve(
    config: &CourierConfig,
    routes: &Path,
    category: &str,
    priority: &str,
    app_id: &str,
    extra: Vec<(String, String)>,
) -> Result<()> {
    let resolver = QueueResolver::new(ResolverConfig::from_file(routes)?);
    let priority: OrchestrationPriority = priority.parse()?;

    let provisioner = build_provisioner(config)?;
    let mut tokens = provisioner.token_set(app_id).await;
    for (name, value) in extra {
        tokens.insert(name, value);
    }

    let value = resolver.resolve(category, priority, &AppContext::with_tokens(app_id, tokens))?;
    print_json(&value)
}

async fn provision(config: &CourierConfig, pipeline: &Path, app_id: Option<&str>) -> Result<()> {
    let pipeline = PipelineDefinition::from_file(pipeline)?;
    let app_id = app_id
        .or(pipeline.app_id.as_deref())
        .unwrap_or(courier_core::routing::FALLBACK_APP_ID)
        .to_string();

    let provisioner = build_provisioner(config)?;
    let result = provisioner.provision_pipeline(&pipeline, &app_id).await?;
    print_json(&result)?;
    if !result.success() {
        bail!("{} queue(s) failed to provision", result.total_failed);
    }
    Ok(())
}

async fn queues(config: &CourierConfig, action: QueueAction) -> Result<()> {
    let admin = build_queue_admin(&config.backend)?;
    let location = config.backend.location.as_str();
    let (verb, name, changed) = match action {
        QueueAction::List => {
            for name in admin.list_queues(location).await? {
                println!("{name}");
            }
            return Ok(());
        }
        QueueAction::Delete { name } => {
            let changed = admin.delete_queue(&name, location).await?;
            ("deleted", name, changed)
        }
        QueueAction::Pause { name } => {
            let changed = admin.pause_queue(&name, location).await?;
            ("paused", name, changed)
        }
        QueueAction::Resume { name } => {
            let changed = admin.resume_queue(&name, location).await?;
            ("resumed", name, changed)
        }
    };
    if !changed {
        bail!("queue '{name}' not found in {location}");
    }
    println!("{verb} {name}");
    Ok(())
}
