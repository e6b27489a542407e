//! Narrata server entry point: loads configuration, wires the external
//! collaborators, and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use narrata_config::load_settings;
use narrata_core::traits::llm::LanguageModel;
use narrata_core::traits::storage::BlobStorage;
use narrata_core::traits::tts::TextToSpeech;
use narrata_llm::{HttpLanguageModel, LlmConfig};
use narrata_repository::{InMemoryBlobStorage, InMemoryBookRepository};
use narrata_server::state::AppState;
use narrata_tts::{HttpTextToSpeech, TtsConfig};

fn llm_config_from_env() -> LlmConfig {
    let mut config = LlmConfig::default();
    if let Ok(model) = std::env::var("NARRATA_LLM_MODEL") {
        config.model = model;
    }
    if let Ok(endpoint) = std::env::var("NARRATA_LLM_ENDPOINT") {
        config.endpoint = endpoint;
    }
    config.api_key = std::env::var("NARRATA_LLM_API_KEY").ok();
    if let Ok(secs) = std::env::var("NARRATA_LLM_TIMEOUT_SECONDS") {
        if let Ok(secs) = secs.parse() {
            config.timeout = Duration::from_secs(secs);
        }
    }
    config
}

fn tts_config_from_env() -> TtsConfig {
    let mut config = TtsConfig::default();
    if let Ok(endpoint) = std::env::var("NARRATA_TTS_ENDPOINT") {
        config.endpoint = endpoint;
    }
    config.api_key = std::env::var("NARRATA_TTS_API_KEY").ok();
    if let Ok(name) = std::env::var("NARRATA_TTS_PROVIDER_NAME") {
        config.provider_name = name;
    }
    if let Ok(secs) = std::env::var("NARRATA_TTS_TIMEOUT_SECONDS") {
        if let Ok(secs) = secs.parse() {
            config.timeout = Duration::from_secs(secs);
        }
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config_path = std::env::var("NARRATA_CONFIG_FILE").ok();
    let settings = load_settings(config_path.as_deref())?;

    let repository: Arc<dyn narrata_core::traits::repository::BookRepository> = Arc::new(InMemoryBookRepository::new());
    let storage: Arc<dyn BlobStorage> = Arc::new(InMemoryBlobStorage::new());
    let llm: Arc<dyn LanguageModel> = Arc::new(HttpLanguageModel::new(llm_config_from_env())?);
    let tts: Arc<dyn TextToSpeech> = Arc::new(HttpTextToSpeech::new(tts_config_from_env())?);

    let metrics_handle = narrata_server::init_metrics();

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let state = AppState::new(settings, repository, storage, llm, tts, metrics_handle);

    let app = narrata_server::create_router(state);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(host = %host, port, "narrata server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
