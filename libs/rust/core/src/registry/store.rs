use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::gradient::{EvalOutcome, Gradient};
use super::model::{Model, ModelEntry};
use crate::content_ref::{ContentRef, ContentRefError};
use crate::error::RegistryError;
use crate::escrow::EscrowLedger;
use crate::events::{EventLog, EventRecord, RegistryEvent};
use crate::metrics_ext::{record_rejection, REGISTRY_METRICS};
use crate::types::{AccountId, Amount, GradientId, ModelId};

/// What `eval_gradient` does with a gradient that is already evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPolicy {
    /// Return `EvalOutcome::Ignored` and change nothing.
    #[default]
    Ignore,
    /// Fail with `RegistryError::AlreadyEvaluated`.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub evaluation_policy: EvaluationPolicy,
    /// Capacity of the event broadcast channel; slow subscribers lag past it.
    pub event_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self { Self { evaluation_policy: EvaluationPolicy::Ignore, event_buffer: 1024 } }
}

/// The ledger of record. Long-lived; share it behind an `Arc` and call it from
/// any thread.
///
/// Lock order is model table, then a model's gradient list, then a gradient's
/// evaluation state. Escrow and the event log are leaves.
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    models: RwLock<Vec<Arc<ModelEntry>>>,
    escrow: EscrowLedger,
    events: EventLog,
}

impl Default for Registry {
    fn default() -> Self { Self::new(RegistryConfig::default()) }
}

fn reject(err: RegistryError) -> RegistryError {
    record_rejection(err.reason());
    debug!(reason = err.reason(), error = %err, "registry call rejected");
    err
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        let events = EventLog::new(config.event_buffer);
        Self { config, models: RwLock::new(Vec::new()), escrow: EscrowLedger::new(), events }
    }

    pub(crate) fn from_parts(config: RegistryConfig, models: Vec<ModelEntry>, escrow: EscrowLedger) -> Self {
        let events = EventLog::new(config.event_buffer);
        Self { config, models: RwLock::new(models.into_iter().map(Arc::new).collect()), escrow, events }
    }

    pub fn escrow(&self) -> &EscrowLedger { &self.escrow }

    pub fn events(&self) -> &EventLog { &self.events }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventRecord> { self.events.subscribe() }

    /// Register a model. Anyone may call this; `caller` becomes the owner and
    /// `bounty` is escrowed under the new id.
    pub fn add_model(
        &self,
        content: ContentRef,
        initial_error: u64,
        target_error: u64,
        bounty: Amount,
        caller: &AccountId,
    ) -> Result<ModelId, RegistryError> {
        if content.is_unset() {
            return Err(reject(RegistryError::InvalidContent(ContentRefError::Empty)));
        }
        let mut models = self.models.write();
        let model_id = models.len() as ModelId;
        self.escrow.deposit(model_id, bounty).map_err(reject)?;

        let model = Model { id: model_id, owner: caller.clone(), bounty, initial_error, target_error, content };
        models.push(Arc::new(ModelEntry::new(model)));
        self.events.emit(RegistryEvent::ModelAdded { model_id, owner: caller.clone(), bounty });
        drop(models);

        REGISTRY_METRICS.models_registered_total.add(1, &[]);
        REGISTRY_METRICS.deposit_amount.record(bounty as f64, &[]);
        info!(model_id, owner = %caller, bounty = %bounty, initial_error, target_error, "model registered");
        Ok(model_id)
    }

    fn entry(&self, model_id: ModelId) -> Result<Arc<ModelEntry>, RegistryError> {
        let idx = usize::try_from(model_id).map_err(|_| RegistryError::ModelNotFound(model_id))?;
        self.models.read().get(idx).cloned().ok_or(RegistryError::ModelNotFound(model_id))
    }

    pub fn get_model(&self, model_id: ModelId) -> Result<Model, RegistryError> {
        debug!(model_id, "get_model");
        Ok(self.entry(model_id).map_err(reject)?.model.clone())
    }

    /// Submit a gradient against an existing model. Any caller may submit and
    /// identical content may be submitted repeatedly.
    pub fn add_gradient(&self, model_id: ModelId, content: ContentRef, caller: &AccountId) -> Result<GradientId, RegistryError> {
        let entry = self.entry(model_id).map_err(reject)?;
        if content.is_unset() {
            return Err(reject(RegistryError::InvalidContent(ContentRefError::Empty)));
        }
        let gradient_id = entry.append_gradient(caller.clone(), content, |gradient_id| {
            self.events.emit(RegistryEvent::GradientAdded { model_id, gradient_id, creator: caller.clone() });
        });
        REGISTRY_METRICS.gradients_submitted_total.add(1, &[]);
        info!(model_id, gradient_id, creator = %caller, "gradient submitted");
        Ok(gradient_id)
    }

    pub fn get_gradient(&self, model_id: ModelId, gradient_id: GradientId) -> Result<Gradient, RegistryError> {
        debug!(model_id, gradient_id, "get_gradient");
        let entry = self.entry(model_id).map_err(reject)?;
        let gradient = entry.gradient(gradient_id)
            .ok_or_else(|| reject(RegistryError::GradientNotFound { model_id, gradient_id }))?;
        Ok(gradient.snapshot())
    }

    /// Record the error and updated weights of a gradient. Owner only, and at
    /// most once per gradient; a repeat is handled per `EvaluationPolicy`.
    pub fn eval_gradient(
        &self,
        model_id: ModelId,
        gradient_id: GradientId,
        new_error: u64,
        updated_weights: ContentRef,
        caller: &AccountId,
    ) -> Result<EvalOutcome, RegistryError> {
        let entry = self.entry(model_id).map_err(reject)?;
        let gradient = entry.gradient(gradient_id)
            .ok_or_else(|| reject(RegistryError::GradientNotFound { model_id, gradient_id }))?;
        if entry.model.owner != *caller {
            warn!(model_id, gradient_id, caller = %caller, owner = %entry.model.owner, "evaluation by non-owner refused");
            return Err(reject(RegistryError::Unauthorized { model_id, caller: caller.clone() }));
        }

        let outcome = gradient.evaluate_once(new_error, updated_weights, || {
            self.events.emit(RegistryEvent::GradientEvaluated { model_id, gradient_id, error: new_error });
        });
        match outcome {
            EvalOutcome::Applied => {
                REGISTRY_METRICS.evaluations_applied_total.add(1, &[]);
                info!(model_id, gradient_id, error = new_error, "gradient evaluated");
                Ok(outcome)
            }
            EvalOutcome::Ignored => match self.config.evaluation_policy {
                EvaluationPolicy::Ignore => {
                    REGISTRY_METRICS.evaluations_ignored_total.add(1, &[]);
                    warn!(model_id, gradient_id, attempted_error = new_error, "gradient already evaluated; keeping first result");
                    Ok(outcome)
                }
                EvaluationPolicy::Reject => Err(reject(RegistryError::AlreadyEvaluated { model_id, gradient_id })),
            },
        }
    }

    pub fn model_count(&self) -> u64 { self.models.read().len() as u64 }

    pub fn gradient_count(&self, model_id: ModelId) -> Result<u64, RegistryError> {
        Ok(self.entry(model_id).map_err(reject)?.gradient_count())
    }

    pub fn list_gradients(&self, model_id: ModelId) -> Result<Vec<Gradient>, RegistryError> {
        Ok(self.entry(model_id).map_err(reject)?.gradients())
    }

    pub fn list_models(&self) -> Vec<Model> {
        self.models.read().iter().map(|m| m.model.clone()).collect()
    }

    /// Escrowed balance for an existing model.
    pub fn bounty_of(&self, model_id: ModelId) -> Result<Amount, RegistryError> {
        self.entry(model_id).map_err(reject)?;
        Ok(self.escrow.balance_of(model_id).unwrap_or(0))
    }

    pub fn is_evaluated(&self, model_id: ModelId, gradient_id: GradientId) -> Result<bool, RegistryError> {
        Ok(self.get_gradient(model_id, gradient_id)?.is_evaluated())
    }

    pub(crate) fn model_entries(&self) -> Vec<Arc<ModelEntry>> { self.models.read().clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Evaluation;

    fn cref(s: &str) -> ContentRef { ContentRef::from_identifier(s).unwrap() }

    #[test]
    fn add_model_persists_every_field() {
        let reg = Registry::default();
        let owner = AccountId::from("0xA");
        let id = reg.add_model(cref("QmModel"), 42, 1337, 10_000, &owner).unwrap();
        assert_eq!(id, 0);
        let m = reg.get_model(id).unwrap();
        assert_eq!((m.owner, m.bounty, m.initial_error, m.target_error, m.content), (owner, 10_000, 42, 1337, cref("QmModel")));
        assert_eq!(reg.bounty_of(id).unwrap(), 10_000);
    }

    #[test]
    fn zero_bounty_is_accepted() {
        let reg = Registry::default();
        let id = reg.add_model(cref("QmFree"), 1, 0, 0, &"0xA".into()).unwrap();
        assert_eq!(reg.get_model(id).unwrap().bounty, 0);
    }

    #[test]
    fn unset_content_is_rejected_without_allocating() {
        let reg = Registry::default();
        let err = reg.add_model(ContentRef::UNSET, 1, 0, 5, &"0xA".into()).unwrap_err();
        assert_eq!(err, RegistryError::InvalidContent(ContentRefError::Empty));
        assert_eq!(reg.model_count(), 0);
        assert_eq!(reg.escrow().total_held(), 0);
        assert!(reg.events().is_empty());
    }

    #[test]
    fn overflowing_deposit_leaves_no_model_behind() {
        let reg = Registry::default();
        reg.add_model(cref("QmA"), 1, 0, Amount::MAX, &"0xA".into()).unwrap();
        let err = reg.add_model(cref("QmB"), 1, 0, 1, &"0xA".into()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDeposit(_)));
        assert_eq!(reg.model_count(), 1);
        assert_eq!(reg.get_model(1), Err(RegistryError::ModelNotFound(1)));
    }

    #[test]
    fn gradients_start_pending_with_sentinels() {
        let reg = Registry::default();
        let m = reg.add_model(cref("QmModel"), 42, 1337, 1, &"0xA".into()).unwrap();
        let g = reg.add_gradient(m, cref("QmGrad"), &"0xB".into()).unwrap();
        let grad = reg.get_gradient(m, g).unwrap();
        assert_eq!(grad.id, 0);
        assert_eq!(grad.creator, AccountId::from("0xB"));
        assert_eq!(grad.evaluation, Evaluation::Pending);
        assert_eq!(grad.error(), 0);
        assert_eq!(grad.weights(), ContentRef::UNSET);
    }

    #[test]
    fn gradient_ids_are_scoped_per_model() {
        let reg = Registry::default();
        let a = reg.add_model(cref("QmA"), 1, 0, 0, &"0xA".into()).unwrap();
        let b = reg.add_model(cref("QmB"), 1, 0, 0, &"0xA".into()).unwrap();
        assert_eq!(reg.add_gradient(a, cref("QmG"), &"0xB".into()).unwrap(), 0);
        assert_eq!(reg.add_gradient(a, cref("QmG"), &"0xB".into()).unwrap(), 1);
        assert_eq!(reg.add_gradient(b, cref("QmG"), &"0xC".into()).unwrap(), 0);
        assert_eq!(reg.gradient_count(a).unwrap(), 2);
        assert_eq!(reg.gradient_count(b).unwrap(), 1);
    }

    #[test]
    fn missing_ids_are_reported_precisely() {
        let reg = Registry::default();
        assert_eq!(reg.add_gradient(0, cref("QmG"), &"0xB".into()), Err(RegistryError::ModelNotFound(0)));
        let m = reg.add_model(cref("QmA"), 1, 0, 0, &"0xA".into()).unwrap();
        assert_eq!(reg.get_gradient(m, 3), Err(RegistryError::GradientNotFound { model_id: m, gradient_id: 3 }));
        assert_eq!(reg.get_gradient(9, 0), Err(RegistryError::ModelNotFound(9)));
        assert_eq!(
            reg.eval_gradient(m, 0, 1, ContentRef::UNSET, &"0xA".into()),
            Err(RegistryError::GradientNotFound { model_id: m, gradient_id: 0 })
        );
    }

    #[test]
    fn only_owner_may_evaluate() {
        let reg = Registry::default();
        let owner = AccountId::from("0xA");
        let m = reg.add_model(cref("QmA"), 42, 1337, 0, &owner).unwrap();
        let g = reg.add_gradient(m, cref("QmG"), &"0xB".into()).unwrap();
        let w = cref("QmW1");

        let err = reg.eval_gradient(m, g, 1, w, &"0xB".into()).unwrap_err();
        assert_eq!(err, RegistryError::Unauthorized { model_id: m, caller: "0xB".into() });
        assert!(!reg.is_evaluated(m, g).unwrap());

        assert_eq!(reg.eval_gradient(m, g, 1, w, &owner).unwrap(), EvalOutcome::Applied);
        assert_eq!(reg.get_gradient(m, g).unwrap().weights(), w);
    }

    #[test]
    fn reject_policy_reports_repeat_evaluation() {
        let reg = Registry::new(RegistryConfig { evaluation_policy: EvaluationPolicy::Reject, ..Default::default() });
        let owner = AccountId::from("0xA");
        let m = reg.add_model(cref("QmA"), 42, 1337, 0, &owner).unwrap();
        let g = reg.add_gradient(m, cref("QmG"), &owner).unwrap();
        let w = cref("QmW");
        reg.eval_gradient(m, g, 1, w, &owner).unwrap();
        assert_eq!(reg.eval_gradient(m, g, 2, w, &owner), Err(RegistryError::AlreadyEvaluated { model_id: m, gradient_id: g }));
        assert_eq!(reg.get_gradient(m, g).unwrap().error(), 1);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
    }

    fn repeat_evaluation_log(policy: EvaluationPolicy) -> (Result<EvalOutcome, RegistryError>, String) {
        let buf = LogBuffer::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || {
            let reg = Registry::new(RegistryConfig { evaluation_policy: policy, ..Default::default() });
            let owner = AccountId::from("0xA");
            let m = reg.add_model(cref("QmA"), 42, 1337, 0, &owner).unwrap();
            let g = reg.add_gradient(m, cref("QmG"), &owner).unwrap();
            reg.eval_gradient(m, g, 1, cref("QmW"), &owner).unwrap();
            reg.eval_gradient(m, g, 2, cref("QmW"), &owner)
        });
        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        (result, text)
    }

    #[test]
    fn repeat_is_logged_as_ignored_only_under_ignore_policy() {
        let (result, log) = repeat_evaluation_log(EvaluationPolicy::Ignore);
        assert_eq!(result, Ok(EvalOutcome::Ignored));
        assert!(log.contains("keeping first result"));

        let (result, log) = repeat_evaluation_log(EvaluationPolicy::Reject);
        assert_eq!(result, Err(RegistryError::AlreadyEvaluated { model_id: 0, gradient_id: 0 }));
        assert!(!log.contains("keeping first result"));
    }

    #[test]
    fn events_follow_mutations_in_order() {
        let reg = Registry::default();
        let owner = AccountId::from("0xA");
        let m = reg.add_model(cref("QmA"), 42, 1337, 7, &owner).unwrap();
        let g = reg.add_gradient(m, cref("QmG"), &"0xB".into()).unwrap();
        reg.eval_gradient(m, g, 3, cref("QmW"), &owner).unwrap();
        reg.eval_gradient(m, g, 4, cref("QmW"), &owner).unwrap();

        let kinds: Vec<_> = reg.events().events().into_iter().map(|r| r.event).collect();
        assert_eq!(kinds, vec![
            RegistryEvent::ModelAdded { model_id: 0, owner: owner.clone(), bounty: 7 },
            RegistryEvent::GradientAdded { model_id: 0, gradient_id: 0, creator: "0xB".into() },
            RegistryEvent::GradientEvaluated { model_id: 0, gradient_id: 0, error: 3 },
        ]);
    }
}
