use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use bounty_core::{init_tracing, load_config, EventRecord, Registry, RegistryConfig, RegistrySnapshot};

mod scenario;
use scenario::{Scenario, StepReport};

const SERVICE: &str = "registry-host";

#[derive(Serialize)]
struct RunReport<'a> {
    steps: &'a [StepReport],
    events: Vec<EventRecord>,
    escrow_total: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(SERVICE)?;
    let cfg = load_config(SERVICE)?;
    info!(?cfg, "config_loaded");

    let scenario_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REGISTRY_SCENARIO").ok())
        .unwrap_or_else(|| "scenarios/bounty_round.yaml".into());
    let snapshot_path = std::env::var("REGISTRY_SNAPSHOT").ok();

    let registry = open_registry(snapshot_path.as_deref(), cfg.registry.clone()).await?;
    info!(models = registry.model_count(), "registry_ready");

    let scenario = Scenario::load(&scenario_path)
        .await
        .with_context(|| format!("loading scenario {scenario_path}"))?;
    let reports = scenario.replay(&registry);

    let out = RunReport {
        steps: &reports,
        events: registry.events().events(),
        escrow_total: registry.escrow().total_held().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);

    if let Some(path) = snapshot_path {
        save_snapshot(&path, &registry).await?;
    }
    info!("shutdown");
    Ok(())
}

async fn open_registry(snapshot: Option<&str>, config: RegistryConfig) -> Result<Registry> {
    match snapshot {
        Some(path) if Path::new(path).exists() => {
            let bytes = tokio::fs::read(path).await.with_context(|| format!("reading snapshot {path}"))?;
            let image: RegistrySnapshot = serde_json::from_slice(&bytes).context("decoding snapshot")?;
            Ok(Registry::restore(image, config)?)
        }
        _ => Ok(Registry::new(config)),
    }
}

async fn save_snapshot(path: &str, registry: &Registry) -> Result<()> {
    let image = serde_json::to_vec_pretty(&registry.snapshot())?;
    tokio::fs::write(path, image).await.with_context(|| format!("writing snapshot {path}"))?;
    info!(%path, models = registry.model_count(), "snapshot_written");
    Ok(())
}
