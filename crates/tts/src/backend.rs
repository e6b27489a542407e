//! HTTP-backed `TextToSpeech` implementation.
//!
//! Single-try policy (§6 configuration, §9 Open Question (a)): the trait
//! contract is a plain request/response, with no retry loop here. A caller
//! that wants retries must add one explicitly; this provider does not.

use std::time::Duration;

use async_trait::async_trait;
use narrata_core::traits::tts::{SynthesisResult, TextToSpeech, TtsError, VoiceInfo};
use narrata_core::{AudioFormat, TimestampItem, TimestampPrecision, Timestamps};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub provider_name: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.elevenlabs.io/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
            provider_name: "http-tts".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct HttpTextToSpeech {
    client: Client,
    config: TtsConfig,
}

impl HttpTextToSpeech {
    pub fn new(config: TtsConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TtsError::Rejected(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextToSpeech for HttpTextToSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        language: &str,
        voice_description: &str,
    ) -> Result<SynthesisResult, TtsError> {
        let request = SynthesizeRequest {
            text: text.to_string(),
            voice_id: voice_id.to_string(),
            language: language.to_string(),
            voice_description: voice_description.to_string(),
        };

        let mut builder = self
            .client
            .post(format!("{}/synthesize", self.config.endpoint))
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| TtsError::Rejected(format!("malformed synthesis response: {e}")))?;

        let format = parse_format(&parsed.format)?;
        let timestamps = parsed.timestamps.map(|items| Timestamps {
            precision: TimestampPrecision::Word,
            items: items
                .into_iter()
                .map(|t| TimestampItem { token: t.token, start_ms: t.start_ms, end_ms: t.end_ms })
                .collect(),
        });

        Ok(SynthesisResult { audio_bytes: parsed.audio_bytes, format, timestamps })
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError> {
        let mut builder = self.client.get(format!("{}/voices", self.config.endpoint));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }
        response
            .json()
            .await
            .map_err(|e| TtsError::Rejected(format!("malformed voices response: {e}")))
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }
}

fn classify_transport(err: &reqwest::Error) -> TtsError {
    if err.is_timeout() || err.is_connect() {
        TtsError::Transient(err.to_string())
    } else {
        TtsError::Rejected(err.to_string())
    }
}

fn classify_status(status: u16, body: &str) -> TtsError {
    if status == 429 || (500..600).contains(&status) {
        TtsError::Transient(format!("http {status}: {body}"))
    } else {
        TtsError::Rejected(format!("http {status}: {body}"))
    }
}

fn parse_format(raw: &str) -> Result<AudioFormat, TtsError> {
    match raw {
        "mp3" => Ok(AudioFormat::Mp3),
        "wav" => Ok(AudioFormat::Wav),
        "ogg" => Ok(AudioFormat::Ogg),
        "flac" => Ok(AudioFormat::Flac),
        other => Err(TtsError::Rejected(format!("unknown audio format: {other}"))),
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest {
    text: String,
    voice_id: String,
    language: String,
    voice_description: String,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    audio_bytes: Vec<u8>,
    format: String,
    #[serde(default)]
    timestamps: Option<Vec<WireTimestamp>>,
}

#[derive(Debug, Deserialize)]
struct WireTimestamp {
    token: String,
    start_ms: u64,
    end_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_5xx_and_429_as_transient() {
        assert!(matches!(classify_status(503, "x"), TtsError::Transient(_)));
        assert!(matches!(classify_status(429, "x"), TtsError::Transient(_)));
    }

    #[test]
    fn classifies_4xx_as_rejected() {
        assert!(matches!(classify_status(400, "x"), TtsError::Rejected(_)));
    }

    #[test]
    fn parses_known_formats() {
        assert_eq!(parse_format("mp3").unwrap(), AudioFormat::Mp3);
        assert!(parse_format("midi").is_err());
    }
}
