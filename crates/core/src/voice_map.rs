//! Per-book persona-to-voice binding, as submitted by the voice-mapping UI

use serde::{Deserialize, Serialize};

/// A single persona-to-provider-voice binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceBinding {
    pub persona_id: String,
    pub provider_voice_id: String,
}

/// The mapping submitted by a client for a book; values accumulate, they are
/// never removed by the pipeline itself (§3 invariant).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceMap {
    pub book_id: String,
    pub bindings: Vec<VoiceBinding>,
}

impl VoiceMap {
    pub fn new(book_id: impl Into<String>, bindings: Vec<VoiceBinding>) -> Self {
        Self {
            book_id: book_id.into(),
            bindings,
        }
    }
}
