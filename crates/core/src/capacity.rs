//! Capacity ledger: the global ceiling on in-flight combinations.

use serde::{Deserialize, Serialize};

use crate::combination::StoreError;

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub in_use: u32,
    pub max_concurrent: u32,
}

impl CapacitySnapshot {
    /// Free slots (zero when the ceiling was lowered below current usage).
    pub fn available(&self) -> u32 {
        self.max_concurrent.saturating_sub(self.in_use)
    }

    pub fn is_full(&self) -> bool {
        self.available() == 0
    }
}

/// Shared counter of in-flight executions.
///
/// `try_acquire` is a single compare-and-increment: it succeeds only while
/// `in_use < max_concurrent` and never mutates on failure. `release` never
/// takes the counter below zero.
pub trait CapacityLedger: Send + Sync {
    /// Take a slot if one is free. Returns false when full.
    fn try_acquire(&self) -> Result<bool, StoreError>;

    /// Give a slot back. Returns false if nothing was in use.
    fn release(&self) -> Result<bool, StoreError>;

    /// Current usage.
    fn snapshot(&self) -> Result<CapacitySnapshot, StoreError>;

    /// Change the ceiling. Usage above the new ceiling drains naturally.
    fn set_max_concurrent(&self, max_concurrent: u32) -> Result<CapacitySnapshot, StoreError>;

    /// Recompute `in_use` from the records that currently hold capacity.
    fn recount(&self) -> Result<CapacitySnapshot, StoreError>;
}
