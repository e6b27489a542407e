//! Pipeline configuration (§6 "Configuration (enumerated)")

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// All tunables the core pipeline consults. Every field has a built-in
/// default; a partial override (file or env) only replaces the fields it
/// mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Segments produced before the first mapping pause
    pub initial_gate: usize,
    /// Number of concurrent TTS workers
    pub tts_concurrency: usize,
    /// Paragraphs consumed per LLM batch call
    pub segmentation_batch_size: usize,
    /// Preceding paragraphs included as context in each LLM request
    pub context_before: usize,
    /// Following paragraphs included as context in each LLM request
    pub context_after: usize,
    #[serde(with = "duration_secs")]
    pub llm_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub tts_timeout: Duration,
    /// Maximum recursive batch-shrink attempts on a token-limit error before
    /// the remaining paragraphs fall back one-by-one (TTS uses a single-try
    /// policy instead, see §7 Open Question (a))
    pub max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_gate: 5,
            tts_concurrency: 3,
            segmentation_batch_size: 5,
            context_before: 2,
            context_after: 2,
            llm_timeout: Duration::from_secs(60),
            tts_timeout: Duration::from_secs(300),
            max_retries: 3,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = PipelineConfig::default();
        assert_eq!(config.initial_gate, 5);
        assert_eq!(config.tts_concurrency, 3);
        assert_eq!(config.segmentation_batch_size, 5);
        assert_eq!(config.context_before, 2);
        assert_eq!(config.context_after, 2);
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.tts_timeout, Duration::from_secs(300));
    }
}
