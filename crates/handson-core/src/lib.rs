//! Business logic for Hands On AI.
//!
//! Provider abstractions live in [`llm`]; the limiter, rotation, merge,
//! board evaluation and the dispatch engine itself live in [`dispatch`].

pub mod dispatch;
pub mod llm;
