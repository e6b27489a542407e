//! Language model capability trait (§6 "LLM provider")

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One paragraph to segment, with surrounding context for the LLM prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphContext {
    pub index: usize,
    pub text: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

/// A segment as returned directly by the LLM, before canonicalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSegment {
    pub text: String,
    pub person: String,
    pub language: String,
    pub voice_description: String,
}

/// One paragraph's worth of segments from a batch call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSegmentResult {
    pub paragraph_index: usize,
    pub segments: Vec<RawSegment>,
}

/// §7 error taxonomy for the LLM provider, observable by the segmenter stage
/// so it can apply the batch-shrink / per-paragraph-fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Request was too large for the model's context window
    TokenLimit,
    /// Timeout, 5xx, connection error: retryable via per-paragraph fallback
    Transient,
    /// Malformed response that cannot be coerced into a segment list
    Fatal,
}

#[derive(Error, Debug, Clone)]
#[error("llm error ({kind:?}): {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn token_limit(message: impl Into<String>) -> Self {
        Self { kind: LlmErrorKind::TokenLimit, message: message.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: LlmErrorKind::Transient, message: message.into() }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self { kind: LlmErrorKind::Fatal, message: message.into() }
    }
}

/// Language model interface used by the Segmenter Stage (C3).
///
/// Implementations classify every error into §7's `TokenLimit` /
/// `Transient` / `Fatal` taxonomy so the caller can apply the batch-shrink
/// and per-paragraph fallback policy from §4.3 without inspecting
/// provider-specific error payloads itself.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Segment a single paragraph
    async fn segment(
        &self,
        paragraph: &ParagraphContext,
        known_personas: &[String],
    ) -> Result<Vec<RawSegment>, LlmError>;

    /// Segment a batch of paragraphs in one call
    async fn batch_segment(
        &self,
        paragraphs: &[ParagraphContext],
        known_personas: &[String],
    ) -> Result<Vec<BatchSegmentResult>, LlmError>;

    /// Provider name for logging/metrics
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_constructors_tag_kind() {
        assert_eq!(LlmError::token_limit("x").kind, LlmErrorKind::TokenLimit);
        assert_eq!(LlmError::transient("x").kind, LlmErrorKind::Transient);
        assert_eq!(LlmError::fatal("x").kind, LlmErrorKind::Fatal);
    }
}
