//! YAML scenario replay. Each step names the calling account; the host treats
//! that as the authenticated identity for the call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use bounty_core::{parse_amount, AccountId, ContentRef, GradientId, Model, ModelId, Registry, RegistryError};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io error: {0}")] Io(#[from] std::io::Error),
    #[error("scenario parse error: {0}")] Yaml(#[from] serde_yaml::Error),
}

/// Why a single step produced no result.
#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)] Registry(#[from] RegistryError),
    #[error("result not representable as JSON: {0}")] Render(#[from] serde_json::Error),
}

/// Steps are written as single-key maps (`- add_model: {...}`).
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AddModel { caller: String, content: String, initial_error: u64, target_error: u64, bounty: String },
    AddGradient { caller: String, model_id: ModelId, content: String },
    EvalGradient { caller: String, model_id: ModelId, gradient_id: GradientId, error: u64, weights: String },
    GetModel { model_id: ModelId },
    GetGradient { model_id: ModelId, gradient_id: GradientId },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::AddModel { .. } => "add_model",
            Step::AddGradient { .. } => "add_gradient",
            Step::EvalGradient { .. } => "eval_gradient",
            Step::GetModel { .. } => "get_model",
            Step::GetGradient { .. } => "get_gradient",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    /// Journal sequence numbers of the events this step emitted.
    pub emitted: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self, ScenarioError> { Ok(serde_yaml::from_str(text)?) }

    pub async fn load(path: &str) -> Result<Self, ScenarioError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_yaml(&text)
    }

    /// Apply every step in order. Failed steps are reported and the run continues.
    pub fn replay(&self, registry: &Registry) -> Vec<StepReport> {
        self.steps.iter().enumerate().map(|(i, step)| {
            let op = step.name();
            let before = registry.events().len() as u64;
            let result = apply(registry, step);
            let emitted = registry.events().events_since(before).into_iter().map(|r| r.seq).collect();
            match result {
                Ok(v) => {
                    info!(step = i, op, result = %v, "step applied");
                    StepReport { step: i, op, emitted, ok: Some(v), error: None }
                }
                Err(e) => {
                    warn!(step = i, op, error = %e, "step rejected");
                    StepReport { step: i, op, emitted, ok: None, error: Some(e.to_string()) }
                }
            }
        }).collect()
    }
}

fn render<T: Serialize>(value: &T) -> Result<Value, StepError> { Ok(serde_json::to_value(value)?) }

/// Amounts are wider than JSON numbers carry, so the bounty goes out as a decimal string.
fn render_model(model: &Model) -> Result<Value, StepError> {
    let content = render(&model.content)?;
    Ok(json!({
        "id": model.id,
        "owner": model.owner.to_string(),
        "bounty": model.bounty.to_string(),
        "initial_error": model.initial_error,
        "target_error": model.target_error,
        "content": content,
    }))
}

fn content(id: &str) -> Result<ContentRef, RegistryError> { Ok(ContentRef::from_identifier(id)?) }

fn apply(registry: &Registry, step: &Step) -> Result<Value, StepError> {
    match step {
        Step::AddModel { caller, content: c, initial_error, target_error, bounty } => {
            let bounty = parse_amount(bounty)?;
            let id = registry.add_model(content(c)?, *initial_error, *target_error, bounty, &AccountId::from(caller.as_str()))?;
            Ok(json!({ "model_id": id }))
        }
        Step::AddGradient { caller, model_id, content: c } => {
            let id = registry.add_gradient(*model_id, content(c)?, &AccountId::from(caller.as_str()))?;
            Ok(json!({ "gradient_id": id }))
        }
        Step::EvalGradient { caller, model_id, gradient_id, error, weights } => {
            let outcome = registry.eval_gradient(*model_id, *gradient_id, *error, content(weights)?, &AccountId::from(caller.as_str()))?;
            Ok(json!({ "outcome": render(&outcome)? }))
        }
        Step::GetModel { model_id } => render_model(&registry.get_model(*model_id)?),
        Step::GetGradient { model_id, gradient_id } => render(&registry.get_gradient(*model_id, *gradient_id)?),
    }
}
