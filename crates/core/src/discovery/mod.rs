//! Discovery of candidate combinations in object storage.
//!
//! Feeds are laid out as `GTFS/{TYPE}/explotation={E}/contract={C}/version={V}/{type}.txt`.
//! A combination is complete when every required feed type is present.

mod file;
mod filesystem;
mod types;

pub use file::{CombinationEntry, CombinationsFile, FileCombinationSource};
pub use filesystem::{FsCombinationSource, SEED_FEED_TYPE};
pub use types::*;
