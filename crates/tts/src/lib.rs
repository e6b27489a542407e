//! HTTP-backed text-to-speech provider.

pub mod backend;

pub use backend::{HttpTextToSpeech, TtsConfig};
