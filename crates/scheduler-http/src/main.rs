// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scheduler_config::load_pipelines_toml;
use scheduler_controller::{ConfigEvent, PipelineController};
use scheduler_core::{PipelineConfig, PipelineType, SchedulingDomain};
use scheduler_http::builtin::NoopStep;
use scheduler_http::{build_app, AppState};
use scheduler_runtime::{EventBus, SchedulingStep, StepRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scheduler-http", version, about = "Scheduler pipeline HTTP adapter")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8089")]
    bind: String,

    /// Path to a TOML file holding a `[[pipelines]]` array.
    #[arg(long, default_value = "pipelines.toml")]
    config: PathBuf,

    /// Per-request deadline, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    deadline_ms: u64,

    /// Enable request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("scheduler=debug")
    } else {
        EnvFilter::new("scheduler=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let configs = load_pipelines_toml(&args.config)
        .with_context(|| format!("load pipeline config {}", args.config.display()))?;

    let registry = Arc::new(build_registry());
    let events = Arc::new(EventBus::new(256));
    let controllers = build_controllers(configs, &registry, &events).await;

    let state = Arc::new(AppState::new(controllers, Duration::from_millis(args.deadline_ms)));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, config = %args.config.display(), "scheduler-http listening");

    axum::serve(listener, app).await.context("serve")
}

fn build_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register(
        "noop",
        Arc::new(|| Box::new(NoopStep::new()) as Box<dyn SchedulingStep>),
    );
    registry
}

async fn build_controllers(
    configs: Vec<PipelineConfig>,
    registry: &Arc<StepRegistry>,
    events: &Arc<EventBus>,
) -> HashMap<SchedulingDomain, Arc<PipelineController>> {
    let mut by_domain: HashMap<SchedulingDomain, Vec<PipelineConfig>> = HashMap::new();
    for config in configs {
        if config.pipeline_type != PipelineType::FilterWeigher {
            continue;
        }
        by_domain.entry(config.scheduling_domain).or_default().push(config);
    }

    let mut controllers = HashMap::new();
    for (domain, domain_configs) in by_domain {
        let controller = Arc::new(PipelineController::new(
            domain,
            PipelineType::FilterWeigher,
            registry.clone(),
            Some(events.clone()),
        ));
        for config in domain_configs {
            controller
                .handle_config_event(ConfigEvent::Upserted {
                    name: config.name.clone(),
                    config,
                })
                .await;
        }
        controllers.insert(domain, controller);
    }
    controllers
}
