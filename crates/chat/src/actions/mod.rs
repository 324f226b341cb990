//! Message actions module
//!
//! Provides the status tracker that moves store messages to delivered or
//! read on the backend and locally, and the shopping assistant that turns
//! questions into product suggestions.

mod assistant;
mod status;

pub use assistant::{Assistant, SearchArea};
pub use status::{StatusOutcome, StatusTracker};
