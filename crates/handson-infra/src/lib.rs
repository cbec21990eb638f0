//! Infrastructure for Hands On AI: concrete provider adapters, pricing,
//! and configuration loading.

pub mod config;
pub mod llm;
