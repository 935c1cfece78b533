//! Escrow ledger holding the bounty deposited with each model.
//!
//! Deposit-only: there is no withdrawal or payout path, so balances never
//! decrease. Callers outside the crate can read balances but only the registry
//! credits them, from inside its model-creation write scope.

use std::collections::BTreeMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::RegistryError;
use crate::types::{Amount, ModelId};

#[derive(Debug, Default)]
struct Ledger {
    balances: BTreeMap<ModelId, Amount>,
    total_held: Amount,
}

#[derive(Debug, Default)]
pub struct EscrowLedger {
    inner: RwLock<Ledger>,
}

impl EscrowLedger {
    pub fn new() -> Self { Self::default() }

    /// Credit `amount` to `model_id`. Fails without touching the ledger if the
    /// total held would overflow.
    pub(crate) fn deposit(&self, model_id: ModelId, amount: Amount) -> Result<Amount, RegistryError> {
        let mut ledger = self.inner.write();
        let total = ledger.total_held.checked_add(amount)
            .ok_or_else(|| RegistryError::deposit_overflow(model_id, amount, ledger.total_held))?;
        let balance = ledger.balances.get(&model_id).copied().unwrap_or(0);
        let new_balance = balance.checked_add(amount)
            .ok_or_else(|| RegistryError::deposit_overflow(model_id, amount, balance))?;
        ledger.balances.insert(model_id, new_balance);
        ledger.total_held = total;
        debug!(model_id, amount = %amount, total_held = %total, "escrow credited");
        Ok(new_balance)
    }

    /// Balance held for a model; `None` if nothing was ever deposited for it.
    pub fn balance_of(&self, model_id: ModelId) -> Option<Amount> {
        self.inner.read().balances.get(&model_id).copied()
    }

    pub fn total_held(&self) -> Amount { self.inner.read().total_held }

    pub fn balances(&self) -> BTreeMap<ModelId, Amount> { self.inner.read().balances.clone() }

    pub(crate) fn from_balances(balances: BTreeMap<ModelId, Amount>) -> Result<Self, RegistryError> {
        let ledger = Self::new();
        for (id, amount) in balances { ledger.deposit(id, amount)?; }
        Ok(ledger)
    }
}
