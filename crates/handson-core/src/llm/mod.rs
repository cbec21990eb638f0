//! LLM provider abstractions for Hands On AI.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `ProviderRegistry`: ordered name-indexed provider table with availability
//! - `MockProvider`: scripted provider for tests and offline runs

pub mod box_provider;
pub mod mock;
pub mod provider;
pub mod registry;
