//! Registry events for external observers.
//!
//! Every successful mutation appends one event to an in-memory journal and
//! publishes it on a broadcast channel. Sequence numbers start at 0 and have no gaps.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{AccountId, Amount, GradientId, ModelId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryEvent {
    ModelAdded { model_id: ModelId, owner: AccountId, bounty: Amount },
    GradientAdded { model_id: ModelId, gradient_id: GradientId, creator: AccountId },
    GradientEvaluated { model_id: ModelId, gradient_id: GradientId, error: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub event: RegistryEvent,
}

pub struct EventLog {
    journal: Mutex<Vec<EventRecord>>,
    tx: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { journal: Mutex::new(Vec::new()), tx }
    }

    /// Callers hold the lock of the mutation being recorded, so journal order
    /// follows id allocation order.
    pub(crate) fn emit(&self, event: RegistryEvent) -> u64 {
        let mut journal = self.journal.lock();
        let record = EventRecord { seq: journal.len() as u64, event };
        // no receivers is fine
        let _ = self.tx.send(record.clone());
        let seq = record.seq;
        journal.push(record);
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> { self.tx.subscribe() }

    pub fn events(&self) -> Vec<EventRecord> { self.journal.lock().clone() }

    pub fn events_since(&self, seq: u64) -> Vec<EventRecord> {
        let journal = self.journal.lock();
        journal.iter().skip(seq as usize).cloned().collect()
    }

    pub fn len(&self) -> usize { self.journal.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).field("subscribers", &self.tx.receiver_count()).finish()
    }
}
