//! Serializable image of a registry, for hosts that persist the ledger.
//!
//! The core does no I/O; a host writes `Registry::snapshot()` wherever it likes
//! and feeds it back through `Registry::restore`. The event journal is not part
//! of the image; a restored registry starts a fresh journal at seq 0.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SnapshotError;
use crate::escrow::EscrowLedger;
use crate::registry::gradient::GradientEntry;
use crate::registry::model::ModelEntry;
use crate::registry::{Gradient, Model, Registry, RegistryConfig};
use crate::types::{Amount, GradientId, ModelId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelImage {
    pub model: Model,
    pub gradients: Vec<Gradient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub models: Vec<ModelImage>,
    pub escrow: BTreeMap<ModelId, Amount>,
}

impl Registry {
    /// Each model image is consistent on its own; gradients appended to other
    /// models while the snapshot is taken may or may not be included.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let models: Vec<ModelImage> = self.model_entries().iter()
            .map(|e| ModelImage { model: e.model.clone(), gradients: e.gradients() })
            .collect();
        let mut escrow = self.escrow().balances();
        escrow.retain(|id, _| (*id as usize) < models.len());
        RegistrySnapshot { models, escrow }
    }

    pub fn restore(snapshot: RegistrySnapshot, config: RegistryConfig) -> Result<Self, SnapshotError> {
        let mut entries = Vec::with_capacity(snapshot.models.len());
        for (expected, image) in snapshot.models.into_iter().enumerate() {
            let expected = expected as ModelId;
            if image.model.id != expected {
                return Err(SnapshotError::SparseModelId { expected, found: image.model.id });
            }
            if image.model.content.is_unset() {
                return Err(SnapshotError::UnsetModelContent { model_id: expected });
            }
            let held = snapshot.escrow.get(&expected).copied().unwrap_or(0);
            if held != image.model.bounty {
                return Err(SnapshotError::EscrowMismatch { model_id: expected, held, bounty: image.model.bounty });
            }
            let mut gradients = Vec::with_capacity(image.gradients.len());
            for (g_expected, g) in image.gradients.into_iter().enumerate() {
                let g_expected = g_expected as GradientId;
                if g.id != g_expected {
                    return Err(SnapshotError::SparseGradientId { model_id: expected, expected: g_expected, found: g.id });
                }
                if g.content.is_unset() {
                    return Err(SnapshotError::UnsetGradientContent { model_id: expected, gradient_id: g.id });
                }
                gradients.push(GradientEntry::with_evaluation(g.id, g.creator, g.content, g.evaluation));
            }
            entries.push(ModelEntry::with_gradients(image.model, gradients));
        }
        if let Some(unknown) = snapshot.escrow.keys().find(|id| **id >= entries.len() as ModelId) {
            return Err(SnapshotError::UnknownEscrowEntry(*unknown));
        }
        let escrow = EscrowLedger::from_balances(snapshot.escrow)?;
        info!(models = entries.len(), "registry restored from snapshot");
        Ok(Registry::from_parts(config, entries, escrow))
    }
}
