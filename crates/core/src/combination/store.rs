//! Combination storage trait and types.

use thiserror::Error;

use crate::capacity::CapacityLedger;

use super::{Combination, CombinationKey, CombinationStatus, TransitionError};

/// Default page size for scans.
pub const MAX_SCAN_ITEMS: i64 = 100;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No combination with this key.
    #[error("combination not found: {0}")]
    NotFound(String),

    /// I/O or database failure; the operation may be retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Another writer changed the record between read and write.
    #[error("concurrent update conflict on {0}")]
    Conflict(String),

    /// The update needed a capacity slot and none was free.
    #[error("capacity exhausted ({in_use}/{max_concurrent} in use)")]
    CapacityExhausted { in_use: u32, max_concurrent: u32 },

    /// The mutator refused the change.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl StoreError {
    /// Transient errors: re-running the tick later is the retry strategy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Filter for querying combinations.
#[derive(Debug, Clone, Default)]
pub struct CombinationFilter {
    /// Keep only these statuses (empty = any).
    pub statuses: Vec<CombinationStatus>,
    /// Filter by enterprise.
    pub enterprise_id: Option<String>,
    /// Maximum number of results (negative = unbounded).
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl CombinationFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            statuses: Vec::new(),
            enterprise_id: None,
            limit: MAX_SCAN_ITEMS,
            offset: 0,
        }
    }

    /// Filter by status. Can be called repeatedly to accept several.
    pub fn with_status(mut self, status: CombinationStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Filter by enterprise.
    pub fn with_enterprise(mut self, enterprise_id: impl Into<String>) -> Self {
        self.enterprise_id = Some(enterprise_id.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Remove the page size limit (full scans for reporting and sweeps).
    pub fn unbounded(mut self) -> Self {
        self.limit = -1;
        self
    }
}

/// Pure record transformation applied under the store's per-key atomicity.
pub type Mutator<'a> = &'a dyn Fn(&Combination) -> Result<Combination, TransitionError>;

/// Trait for combination storage backends.
///
/// Capacity accounting is derived from the records: an update that makes a
/// record start holding capacity acquires a slot, one that makes it stop
/// holding capacity releases it, in the same atomic step as the write.
pub trait CombinationStore: Send + Sync {
    /// Get a combination by key.
    fn get(&self, key: &CombinationKey) -> Result<Option<Combination>, StoreError>;

    /// Insert `initial` unless its key is already registered.
    /// Returns true if a record was inserted.
    fn insert_if_absent(&self, initial: &Combination) -> Result<bool, StoreError>;

    /// Atomically read, transform and write one record.
    ///
    /// The mutator sees the latest committed record. Errors it returns abort
    /// the update without side effects.
    fn update(&self, key: &CombinationKey, mutate: Mutator<'_>)
        -> Result<Combination, StoreError>;

    /// List combinations matching the filter, in registration order.
    fn list(&self, filter: &CombinationFilter) -> Result<Vec<Combination>, StoreError>;

    /// Count combinations matching the filter (limit and offset ignored).
    fn count(&self, filter: &CombinationFilter) -> Result<u64, StoreError>;
}

/// A store that also keeps the capacity ledger, so that transitions and
/// capacity changes commit together.
pub trait BatchStore: CombinationStore + CapacityLedger {}

impl<T: CombinationStore + CapacityLedger + ?Sized> BatchStore for T {}
