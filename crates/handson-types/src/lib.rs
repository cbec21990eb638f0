//! Shared domain types for Hands On AI.
//!
//! Messages, generation results, provider descriptors, dispatch outcomes,
//! configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
