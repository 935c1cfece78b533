use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::gradient::{Gradient, GradientEntry};
use crate::content_ref::ContentRef;
use crate::types::{AccountId, Amount, GradientId, ModelId};

/// Read-only view of a model as returned by `get_model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub owner: AccountId,
    pub bounty: Amount,
    pub initial_error: u64,
    pub target_error: u64,
    pub content: ContentRef,
}

/// A registered model and its append-only gradient list. Everything except
/// the list is fixed at creation.
#[derive(Debug)]
pub(crate) struct ModelEntry {
    pub(crate) model: Model,
    gradients: RwLock<Vec<Arc<GradientEntry>>>,
}

impl ModelEntry {
    pub(crate) fn new(model: Model) -> Self {
        Self { model, gradients: RwLock::new(Vec::new()) }
    }

    pub(crate) fn with_gradients(model: Model, gradients: Vec<GradientEntry>) -> Self {
        Self { model, gradients: RwLock::new(gradients.into_iter().map(Arc::new).collect()) }
    }

    /// Allocates the next gradient id and appends under the model's write lock.
    /// `on_append` runs inside that scope.
    pub(crate) fn append_gradient<F>(&self, creator: AccountId, content: ContentRef, on_append: F) -> GradientId
    where F: FnOnce(GradientId) {
        let mut list = self.gradients.write();
        let id = list.len() as GradientId;
        list.push(Arc::new(GradientEntry::new(id, creator, content)));
        on_append(id);
        id
    }

    pub(crate) fn gradient(&self, id: GradientId) -> Option<Arc<GradientEntry>> {
        let idx = usize::try_from(id).ok()?;
        self.gradients.read().get(idx).cloned()
    }

    pub(crate) fn gradient_count(&self) -> u64 { self.gradients.read().len() as u64 }

    pub(crate) fn gradients(&self) -> Vec<Gradient> {
        self.gradients.read().iter().map(|g| g.snapshot()).collect()
    }
}
