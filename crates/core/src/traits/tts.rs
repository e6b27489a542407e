//! Text-to-speech capability trait (§6 "TTS provider")

use crate::segment::Timestamps;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported audio container formats returned by a TTS provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
    Flac,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
        }
    }
}

/// Result of a single synthesis call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub audio_bytes: Vec<u8>,
    pub format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
}

/// A voice available from the provider's catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// §7 error taxonomy applicable to the TTS provider: a single-try policy,
/// no retry (see Open Question (a) in §9).
#[derive(Error, Debug, Clone)]
pub enum TtsError {
    #[error("tts timeout or transient failure: {0}")]
    Transient(String),
    #[error("tts request rejected: {0}")]
    Rejected(String),
}

/// Text-to-speech interface used by the TTS Stage (C4)
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize one segment's text with the bound voice
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        language: &str,
        voice_description: &str,
    ) -> Result<SynthesisResult, TtsError>;

    /// List voices available from this provider's catalog
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError>;

    /// Provider name recorded on each synthesized segment
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_extensions() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Flac.extension(), "flac");
    }
}
