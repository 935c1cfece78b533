//! Identity and value types shared by the registry and escrow.

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

pub type ModelId = u64;
pub type GradientId = u64;
/// Escrowed value, wei-scale.
pub type Amount = u128;

/// Caller identity as authenticated by the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for AccountId { fn from(s: &str) -> Self { Self(s.to_string()) } }
impl From<String> for AccountId { fn from(s: String) -> Self { Self(s) } }

/// Parse a host-supplied decimal deposit. Signs, fractions and overflow are rejected.
pub fn parse_amount(raw: &str) -> Result<Amount, RegistryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RegistryError::InvalidDeposit(format!("{raw:?} is not a non-negative integer")));
    }
    trimmed.parse::<Amount>().map_err(|e| RegistryError::InvalidDeposit(format!("{raw:?}: {e}")))
}
