//! HTTP operator surface for the GTFS batch orchestrator.

pub mod api;
pub mod metrics;
pub mod state;
