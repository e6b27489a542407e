//! HTTP-backed `LanguageModel` implementation, speaking an OpenAI-compatible
//! chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use narrata_core::traits::llm::{
    BatchSegmentResult, LanguageModel, LlmError, ParagraphContext, RawSegment,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Connection settings for the chat-completions backed segmenter.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// `LanguageModel` backed by a chat-completions HTTP endpoint.
#[derive(Clone)]
pub struct HttpLanguageModel {
    client: Client,
    config: LlmConfig,
}

impl HttpLanguageModel {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::fatal(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint)
    }

    fn system_prompt(known_personas: &[String]) -> String {
        let known = if known_personas.is_empty() {
            "none yet".to_string()
        } else {
            known_personas.join(", ")
        };
        format!(
            "Split the given paragraph into spoken segments attributed to a \
             speaker. Known speaker names so far: {known}. Prefer reusing a \
             known name over inventing a new one for the same speaker. \
             Respond with a JSON array of objects: \
             {{\"text\", \"person\", \"language\", \"voice_description\"}}."
        )
    }

    async fn execute(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            response_format: Some(ResponseFormat { kind: "json_object".to_string() }),
        };

        let mut builder = self.client.post(self.api_url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::fatal(format!("malformed chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::fatal("empty choices array"))
    }

    fn parse_segments(raw: &str) -> Result<Vec<RawSegment>, LlmError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wrapper {
            Bare(Vec<RawSegment>),
            Wrapped { segments: Vec<RawSegment> },
        }
        let wrapper: Wrapper = serde_json::from_str(raw)
            .map_err(|e| LlmError::fatal(format!("cannot parse segments: {e}")))?;
        Ok(match wrapper {
            Wrapper::Bare(segments) => segments,
            Wrapper::Wrapped { segments } => segments,
        })
    }
}

/// Classifies the provider's error payload per §7: substring/status
/// inspection, kept isolated so it is unit-testable without a live backend.
fn classify_status(status: u16, body: &str) -> LlmError {
    let lower = body.to_lowercase();
    if status == 413 || lower.contains("context_length_exceeded") || lower.contains("maximum context length") {
        return LlmError::token_limit(format!("http {status}: {body}"));
    }
    if status == 429 || (500..600).contains(&status) {
        return LlmError::transient(format!("http {status}: {body}"));
    }
    LlmError::fatal(format!("http {status}: {body}"))
}

fn classify_transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() || err.is_connect() {
        LlmError::transient(err.to_string())
    } else {
        LlmError::fatal(err.to_string())
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn segment(
        &self,
        paragraph: &ParagraphContext,
        known_personas: &[String],
    ) -> Result<Vec<RawSegment>, LlmError> {
        let messages = vec![
            ChatMessage { role: "system".to_string(), content: Self::system_prompt(known_personas) },
            ChatMessage { role: "user".to_string(), content: paragraph.text.clone() },
        ];
        let raw = self.execute(messages).await?;
        Self::parse_segments(&raw)
    }

    async fn batch_segment(
        &self,
        paragraphs: &[ParagraphContext],
        known_personas: &[String],
    ) -> Result<Vec<BatchSegmentResult>, LlmError> {
        let payload = serde_json::to_string(paragraphs)
            .map_err(|e| LlmError::fatal(format!("cannot encode batch: {e}")))?;
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: format!(
                    "{} Input is a JSON array of paragraphs with index, text, \
                     context_before, context_after. Respond with a JSON array \
                     of {{\"paragraph_index\", \"segments\"}}.",
                    Self::system_prompt(known_personas)
                ),
            },
            ChatMessage { role: "user".to_string(), content: payload },
        ];
        let raw = self.execute(messages).await?;
        serde_json::from_str(&raw).map_err(|e| LlmError::fatal(format!("cannot parse batch response: {e}")))
    }

    fn provider_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrata_core::traits::llm::LlmErrorKind;

    #[test]
    fn classifies_token_limit_by_status_and_body() {
        let err = classify_status(413, "payload too large");
        assert_eq!(err.kind, LlmErrorKind::TokenLimit);

        let err = classify_status(400, "error: context_length_exceeded");
        assert_eq!(err.kind, LlmErrorKind::TokenLimit);
    }

    #[test]
    fn classifies_5xx_and_429_as_transient() {
        assert_eq!(classify_status(503, "unavailable").kind, LlmErrorKind::Transient);
        assert_eq!(classify_status(429, "rate limited").kind, LlmErrorKind::Transient);
    }

    #[test]
    fn classifies_other_4xx_as_fatal() {
        assert_eq!(classify_status(400, "bad request").kind, LlmErrorKind::Fatal);
    }

    #[test]
    fn parses_bare_segment_array() {
        let raw = r#"[{"text":"hi","person":"alice","language":"en","voice_description":"neutral"}]"#;
        let segments = HttpLanguageModel::parse_segments(raw).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].person, "alice");
    }

    #[test]
    fn parses_wrapped_segment_object() {
        let raw = r#"{"segments":[{"text":"hi","person":"bob","language":"en","voice_description":"neutral"}]}"#;
        let segments = HttpLanguageModel::parse_segments(raw).unwrap();
        assert_eq!(segments[0].person, "bob");
    }
}
