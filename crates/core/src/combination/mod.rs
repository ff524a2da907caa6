//! Combinations: the units of work, their state machine and storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteCombinationStore;
pub use store::{
    BatchStore, CombinationFilter, CombinationStore, Mutator, StoreError, MAX_SCAN_ITEMS,
};
pub use types::{
    Combination, CombinationKey, CombinationState, CombinationStatus, FailureKind,
    InvalidCombination, Transition, TransitionError,
};
