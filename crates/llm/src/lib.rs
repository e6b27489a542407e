//! LLM-backed speaker/segment extraction provider.
//!
//! The `LanguageModel` trait itself lives in `narrata-core` (it is
//! implemented by test doubles too); this crate supplies the HTTP-backed
//! production implementation and its §7 error classification.

pub mod backend;

pub use backend::{HttpLanguageModel, LlmConfig};
