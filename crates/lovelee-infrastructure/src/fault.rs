//! Failure injection for the in-memory store.
//!
//! A fault fails the first batch operation that targets a given collection.
//! Operations earlier in the same batch have already been staged when the
//! fault fires, which is exactly the "crash mid-commit" case the atomic
//! commit has to survive.

use std::sync::{Arc, Mutex};

use lovelee_core::error::{LoveleeError, Result};
use lovelee_core::store::WriteOp;

#[derive(Debug, Clone)]
struct Fault {
    collection: String,
    remaining: usize,
}

/// Shared, cloneable set of pending faults.
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    faults: Arc<Mutex<Vec<Fault>>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next write operation against `collection`.
    pub fn fail_next_write_to(&self, collection: &str) {
        self.fail_writes_to(collection, 1);
    }

    /// Fails the next `times` write operations against `collection`.
    pub fn fail_writes_to(&self, collection: &str, times: usize) {
        if times == 0 {
            return;
        }
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.push(Fault {
            collection: collection.to_string(),
            remaining: times,
        });
    }

    pub fn clear(&self) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn pending(&self) -> usize {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|f| f.remaining)
            .sum()
    }

    /// Consumes a matching fault, if any, and reports it as a backend error.
    pub(crate) fn check(&self, op: &WriteOp) -> Result<()> {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        let Some(index) = faults.iter().position(|f| f.collection == op.collection()) else {
            return Ok(());
        };

        faults[index].remaining -= 1;
        if faults[index].remaining == 0 {
            faults.remove(index);
        }

        tracing::debug!(
            collection = op.collection(),
            id = op.id(),
            "Injected write fault"
        );
        Err(LoveleeError::data_access(format!(
            "injected fault writing {}/{}",
            op.collection(),
            op.id()
        )))
    }
}
