use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::content_ref::ContentRef;
use crate::types::{AccountId, GradientId};

/// Evaluation state of one gradient. The only transition is `Pending -> Evaluated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Evaluation {
    #[default]
    Pending,
    Evaluated { error: u64, weights: ContentRef },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalOutcome {
    /// This call recorded the error and weights.
    Applied,
    /// The gradient was already evaluated; nothing changed.
    Ignored,
}

/// Read-only view of a gradient as returned by `get_gradient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gradient {
    pub id: GradientId,
    pub creator: AccountId,
    pub content: ContentRef,
    pub evaluation: Evaluation,
}

impl Gradient {
    /// Recorded error, `0` while pending.
    pub fn error(&self) -> u64 {
        match self.evaluation { Evaluation::Evaluated { error, .. } => error, Evaluation::Pending => 0 }
    }

    /// Recorded weights reference, `ContentRef::UNSET` (both slots zero) while pending.
    pub fn weights(&self) -> ContentRef {
        match self.evaluation { Evaluation::Evaluated { weights, .. } => weights, Evaluation::Pending => ContentRef::UNSET }
    }

    pub fn is_evaluated(&self) -> bool { matches!(self.evaluation, Evaluation::Evaluated { .. }) }
}

#[derive(Debug)]
pub(crate) struct GradientEntry {
    pub(crate) id: GradientId,
    pub(crate) creator: AccountId,
    pub(crate) content: ContentRef,
    evaluation: Mutex<Evaluation>,
}

impl GradientEntry {
    pub(crate) fn new(id: GradientId, creator: AccountId, content: ContentRef) -> Self {
        Self::with_evaluation(id, creator, content, Evaluation::Pending)
    }

    pub(crate) fn with_evaluation(id: GradientId, creator: AccountId, content: ContentRef, evaluation: Evaluation) -> Self {
        Self { id, creator, content, evaluation: Mutex::new(evaluation) }
    }

    /// Check-then-set under the gradient's own lock; of any number of racing
    /// callers exactly one sees `Pending` and gets `Applied`. `on_applied` runs
    /// before the lock is released.
    pub(crate) fn evaluate_once<F>(&self, error: u64, weights: ContentRef, on_applied: F) -> EvalOutcome
    where F: FnOnce() {
        let mut state = self.evaluation.lock();
        match *state {
            Evaluation::Pending => {
                *state = Evaluation::Evaluated { error, weights };
                on_applied();
                EvalOutcome::Applied
            }
            Evaluation::Evaluated { .. } => EvalOutcome::Ignored,
        }
    }

    pub(crate) fn snapshot(&self) -> Gradient {
        Gradient { id: self.id, creator: self.creator.clone(), content: self.content, evaluation: *self.evaluation.lock() }
    }
}
