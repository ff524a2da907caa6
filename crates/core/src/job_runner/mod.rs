//! Job Runner abstraction.
//!
//! The heavy work for each combination runs on an external compute service.
//! This module provides the `JobRunner` trait, an HTTP adapter and a helper
//! that bounds every call with a timeout.

mod call;
mod http;
mod types;

pub use call::timed_call;
pub use http::HttpJobRunner;
pub use types::*;
