//! Core of the bounty registry: models with escrowed bounties, gradient
//! submissions, and owner-only write-once evaluation.

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Layer;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber: `EnvFilter` from `RUST_LOG`, JSON output when
/// `BOUNTY_JSON_LOG` is `1`/`true`. Later calls are no-ops.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("BOUNTY_JSON_LOG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let fmt_layer: Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> = if json {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .boxed()
        };
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::registry().with(fmt_layer).with(env_filter).try_init()?;
        Ok(())
    })?;
    info!(target: "bounty_core", service, "tracing initialized");
    Ok(())
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DynamicConfig {
    pub service_name: Option<String>,
    pub log_level: Option<String>,
    pub config_version: Option<String>,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Layered config: defaults, then the YAML file named by `BOUNTY_CONFIG_FILE`
/// (optional), then `BOUNTY__*` environment variables (`__` separates levels,
/// e.g. `BOUNTY__REGISTRY__EVALUATION_POLICY=reject`).
pub fn load_config(service: &str) -> Result<DynamicConfig> {
    let defaults = RegistryConfig::default();
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("log_level", "info")?
        .set_default("config_version", "0")?
        .set_default("registry.evaluation_policy", "ignore")?
        .set_default("registry.event_buffer", defaults.event_buffer as u64)?;
    if let Ok(file) = std::env::var("BOUNTY_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("BOUNTY")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );
    let cfg: DynamicConfig = builder.build()?.try_deserialize()?;
    info!(target: "bounty_core", service, policy = ?cfg.registry.evaluation_policy, "config loaded");
    Ok(cfg)
}

pub mod content_ref;
pub mod error;
pub mod escrow;
pub mod events;
pub mod registry;
pub mod snapshot;
pub mod types;
mod metrics_ext;

pub use content_ref::{ContentRef, ContentRefError, FILLER, SLOT_WIDTH};
pub use error::{RegistryError, SnapshotError};
pub use escrow::EscrowLedger;
pub use events::{EventLog, EventRecord, RegistryEvent};
pub use registry::{EvalOutcome, Evaluation, EvaluationPolicy, Gradient, Model, Registry, RegistryConfig};
pub use snapshot::{ModelImage, RegistrySnapshot};
pub use types::{parse_amount, AccountId, Amount, GradientId, ModelId};
pub use metrics_ext::{RegistryMetrics, REGISTRY_METRICS};
