use thiserror::Error;

use crate::content_ref::ContentRefError;
use crate::types::{AccountId, Amount, GradientId, ModelId};

/// Every rejected registry call maps to exactly one of these; a rejected call
/// leaves registry state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("model {0} not found")]
    ModelNotFound(ModelId),
    #[error("gradient {gradient_id} not found under model {model_id}")]
    GradientNotFound { model_id: ModelId, gradient_id: GradientId },
    #[error("{caller} is not the owner of model {model_id}")]
    Unauthorized { model_id: ModelId, caller: AccountId },
    #[error("invalid deposit: {0}")]
    InvalidDeposit(String),
    #[error("invalid content reference: {0}")]
    InvalidContent(#[from] ContentRefError),
    #[error("gradient {gradient_id} of model {model_id} was already evaluated")]
    AlreadyEvaluated { model_id: ModelId, gradient_id: GradientId },
}

impl RegistryError {
    /// Short label used as the `reason` metric attribute.
    pub fn reason(&self) -> &'static str {
        match self {
            RegistryError::ModelNotFound(_) => "model_not_found",
            RegistryError::GradientNotFound { .. } => "gradient_not_found",
            RegistryError::Unauthorized { .. } => "unauthorized",
            RegistryError::InvalidDeposit(_) => "invalid_deposit",
            RegistryError::InvalidContent(_) => "invalid_content",
            RegistryError::AlreadyEvaluated { .. } => "already_evaluated",
        }
    }

    pub(crate) fn deposit_overflow(model_id: ModelId, amount: Amount, held: Amount) -> Self {
        RegistryError::InvalidDeposit(format!("deposit {amount} for model {model_id} overflows escrow total {held}"))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("model ids are not dense: expected {expected}, found {found}")]
    SparseModelId { expected: ModelId, found: ModelId },
    #[error("gradient ids of model {model_id} are not dense: expected {expected}, found {found}")]
    SparseGradientId { model_id: ModelId, expected: GradientId, found: GradientId },
    #[error("escrow for model {model_id} holds {held}, model bounty is {bounty}")]
    EscrowMismatch { model_id: ModelId, held: Amount, bounty: Amount },
    #[error("model {model_id} has unset content")]
    UnsetModelContent { model_id: ModelId },
    #[error("gradient {gradient_id} of model {model_id} has unset content")]
    UnsetGradientContent { model_id: ModelId, gradient_id: GradientId },
    #[error("escrow holds balance for unknown model {0}")]
    UnknownEscrowEntry(ModelId),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
