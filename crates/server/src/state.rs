//! Application State
//!
//! Shared state across all HTTP handlers: the orchestrator plus the
//! external collaborators it was started with.

use std::sync::Arc;

use narrata_config::Settings;
use narrata_core::traits::llm::LanguageModel;
use narrata_core::traits::repository::BookRepository;
use narrata_core::traits::storage::BlobStorage;
use narrata_core::traits::tts::TextToSpeech;
use metrics_exporter_prometheus::PrometheusHandle;
use narrata_pipeline::Orchestrator;
use parking_lot::RwLock;

/// Shared application state, handed to every axum handler via `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub orchestrator: Orchestrator,
    pub repository: Arc<dyn BookRepository>,
    pub storage: Arc<dyn BlobStorage>,
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn TextToSpeech>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        config: Settings,
        repository: Arc<dyn BookRepository>,
        storage: Arc<dyn BlobStorage>,
        llm: Arc<dyn LanguageModel>,
        tts: Arc<dyn TextToSpeech>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let orchestrator = Orchestrator::new(config.pipeline.clone());
        Self {
            config: Arc::new(RwLock::new(config)),
            orchestrator,
            repository,
            storage,
            llm,
            tts,
            metrics_handle,
        }
    }
}
