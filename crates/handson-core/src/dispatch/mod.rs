//! Request dispatch across multiple providers.
//!
//! - `UsageLimiter`: daily request/token/cost ceilings with lazy rollover
//! - `RotationSelector`: round-robin provider selection
//! - `merge`: heuristic pick of the best response from a batch
//! - `board`: LLM-judged pick of the best response from a batch
//! - `DispatchEngine`: the orchestrator tying them together

pub mod board;
pub mod engine;
pub mod merge;
pub mod rotation;
pub mod usage;

pub use engine::{DispatchEngine, DispatchInput, DispatchRequest};
pub use rotation::RotationSelector;
pub use usage::{UsageCounters, UsageLimiter, UsageLimits};
