//! HTTP Endpoints
//!
//! REST API for the book narration pipeline: upload, status, personas,
//! voice-map, segment stream, and bundle download (§6).

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use narrata_core::{Book, BookStatus, CancellationToken, Chapter, PipelineStatus, Segment, VoiceBinding, VoiceMap};
use narrata_pipeline::{MappingNeededCallback, StageDependencies};

use crate::state::AppState;
use crate::telemetry::metrics_handler;
use crate::{auth::auth_middleware, ingest, ServerError};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = {
        let config = state.config.read();
        build_cors_layer(&config.server.cors_origins, config.server.cors_enabled)
    };

    Router::new()
        .route("/api/books", post(upload_book))
        .route("/api/books/:id", get(get_book))
        .route("/api/books/:id/status", get(get_status))
        .route("/api/books/:id/segments", get(list_segments))
        .route("/api/books/:id/segments/stream", get(stream_segments))
        .route("/api/books/:id/segments/:segment_id/audio", get(get_segment_audio))
        .route("/api/books/:id/personas", get(get_personas))
        .route("/api/books/:id/voice-map", post(set_voice_map))
        .route("/api/books/:id/bundle", get(download_bundle))
        .route("/api/books/:id/cancel", post(cancel_book))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(auth_middleware))
        .layer(axum::Extension(state.config.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If `cors_enabled` is false, returns a permissive layer (dev only).
/// - If `cors_origins` is empty, defaults to localhost:3000 for safety.
/// - Otherwise, uses the configured origins.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("all configured CORS origins are invalid, falling back to localhost");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(true)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn readiness_check(State(_state): State<AppState>) -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
struct BookResponse {
    book_id: String,
}

/// `POST /api/books` — multipart upload: `title`, `author`, `language` text
/// fields plus a `manuscript` file field. Splits the manuscript into
/// chapters, persists the book record, and starts the pipeline.
async fn upload_book(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<BookResponse>, ServerError> {
    let mut title = None;
    let mut author = None;
    let mut language = "en".to_string();
    let mut manuscript = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ServerError::InvalidRequest(e.to_string()))? {
        match field.name().unwrap_or_default() {
            "title" => title = Some(field.text().await.map_err(|e| ServerError::InvalidRequest(e.to_string()))?),
            "author" => author = Some(field.text().await.map_err(|e| ServerError::InvalidRequest(e.to_string()))?),
            "language" => language = field.text().await.map_err(|e| ServerError::InvalidRequest(e.to_string()))?,
            "manuscript" => manuscript = Some(field.text().await.map_err(|e| ServerError::InvalidRequest(e.to_string()))?),
            _ => {}
        }
    }

    let title = title.ok_or_else(|| ServerError::InvalidRequest("missing title field".to_string()))?;
    let author = author.ok_or_else(|| ServerError::InvalidRequest("missing author field".to_string()))?;
    let manuscript = manuscript.ok_or_else(|| ServerError::InvalidRequest("missing manuscript field".to_string()))?;

    let book_id = uuid::Uuid::new_v4().to_string();
    let chapters = ingest::split_manuscript(&book_id, &manuscript);
    if chapters.is_empty() {
        return Err(ServerError::InvalidRequest("manuscript contained no chapters".to_string()));
    }

    let mut book = Book::new(&book_id, title, author, language.clone());
    book.mark_status(BookStatus::Segmenting);
    let cancel = CancellationToken::new();
    state.repository.save_book(&book, &cancel).await?;
    state.repository.save_chapters(&book_id, &chapters, &cancel).await?;

    let deps = StageDependencies {
        llm: state.llm.clone(),
        tts: state.tts.clone(),
        repository: state.repository.clone(),
        storage: state.storage.clone(),
    };

    let repository_for_progress = state.repository.clone();
    let progress_book_id = book_id.clone();
    let progress_cb: narrata_pipeline::ProgressCallback = std::sync::Arc::new(move |status: PipelineStatus| {
        let repository = repository_for_progress.clone();
        let book_id = progress_book_id.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            if let Ok(mut book) = repository.get_book(&book_id, &cancel).await {
                book.counters.total_paragraphs = status.segmenting.total;
                book.counters.segmented_paragraphs = status.segmenting.current;
                book.counters.synthesized_segments = status.synthesizing.current;
                book.counters.total_segments = status.synthesizing.total;
                let _ = repository.save_book(&book, &cancel).await;
            }
        });
    });

    let repository_for_mapping = state.repository.clone();
    let mapping_book_id = book_id.clone();
    let mapping_needed_cb: MappingNeededCallback = std::sync::Arc::new(move |event| {
        let repository = repository_for_mapping.clone();
        let book_id = mapping_book_id.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            if let Ok(mut book) = repository.get_book(&book_id, &cancel).await {
                book.discovered_personas = event.personas.clone();
                book.unmapped_personas = event.personas;
                book.waiting_for_mapping = true;
                if event.initial {
                    book.mark_status(BookStatus::VoiceMapping);
                } else {
                    book.updated_at = chrono::Utc::now();
                }
                let _ = repository.save_book(&book, &cancel).await;
            }
        });
    });

    state
        .orchestrator
        .start(book_id.clone(), language, chapters, deps, progress_cb, mapping_needed_cb)
        .await?;

    Ok(Json(BookResponse { book_id }))
}

async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Book>, ServerError> {
    let cancel = CancellationToken::new();
    let book = state.repository.get_book(&id, &cancel).await?;
    Ok(Json(book))
}

async fn get_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PipelineStatus>, ServerError> {
    let status = state.orchestrator.get_status(&id).await?;
    Ok(Json(status))
}

async fn list_segments(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<Segment>>, ServerError> {
    let cancel = CancellationToken::new();
    let mut segments = state.repository.list_segments(&id, &cancel).await?;
    segments.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(segments))
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    /// Resume after this segment id, exclusive.
    cursor: Option<String>,
}

/// `GET /api/books/:id/segments/stream` — newline-delimited JSON of
/// segments in id order, optionally resuming after `?cursor=<segment_id>`.
/// Polls the repository rather than pushing, since segments are only ever
/// appended and the client already knows the last id it saw.
async fn stream_segments(State(state): State<AppState>, Path(id): Path<String>, Query(query): Query<StreamQuery>) -> Response {
    let repository = state.repository.clone();
    let orchestrator = state.orchestrator.clone();

    let stream = async_stream::stream! {
        let mut cursor = query.cursor;
        loop {
            let cancel = CancellationToken::new();
            let mut segments = match repository.list_segments(&id, &cancel).await {
                Ok(segments) => segments,
                Err(_) => break,
            };
            segments.sort_by(|a, b| a.id.cmp(&b.id));

            let fresh: Vec<&Segment> = match &cursor {
                Some(after) => segments.iter().filter(|s| s.id.as_str() > after.as_str()).collect(),
                None => segments.iter().collect(),
            };

            for segment in &fresh {
                if let Ok(line) = serde_json::to_string(segment) {
                    yield Ok::<_, Infallible>(axum::body::Bytes::from(format!("{line}\n")));
                }
            }
            if let Some(last) = fresh.last() {
                cursor = Some(last.id.clone());
            }

            let status = orchestrator.get_status(&id).await;
            let done = matches!(&status, Ok(s) if s.ready.status == narrata_core::StageState::Completed)
                || matches!(&status, Err(_));
            if done {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
    };

    let body = Body::from_stream(stream);
    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .unwrap()
}

async fn get_segment_audio(State(state): State<AppState>, Path((book_id, segment_id)): Path<(String, String)>) -> Result<Response, ServerError> {
    let cancel = CancellationToken::new();
    let segments = state.repository.list_segments(&book_id, &cancel).await?;
    let segment = segments
        .into_iter()
        .find(|s| s.id == segment_id)
        .ok_or_else(|| ServerError::NotFound(format!("segment {segment_id}")))?;

    if segment.voice_id.is_none() {
        return Err(ServerError::NotFound(format!("segment {segment_id} has no synthesized audio")));
    }

    let prefix = format!("books/{book_id}/audio/{segment_id}.");
    let matches = state.storage.list(&prefix).await?;
    let path = matches.into_iter().next().ok_or_else(|| ServerError::NotFound(format!("audio for segment {segment_id}")))?;
    let bytes = state.storage.get(&path).await?;
    let ext = path.rsplit('.').next().unwrap_or("bin");
    let content_type = match ext {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

async fn get_personas(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<narrata_pipeline::PersonaDiscovery>, ServerError> {
    match state.orchestrator.get_persona_discovery(&id) {
        Ok(discovery) => Ok(Json(discovery)),
        Err(narrata_core::Error::NotRunning(_)) => {
            // The pipeline has already finished (or was never started in this
            // process); fall back to the book's last-persisted snapshot.
            let cancel = CancellationToken::new();
            let book = state.repository.get_book(&id, &cancel).await?;
            Ok(Json(narrata_pipeline::PersonaDiscovery {
                discovered: book.discovered_personas.clone(),
                mapped: book
                    .discovered_personas
                    .iter()
                    .filter(|p| !book.unmapped_personas.contains(p))
                    .cloned()
                    .collect(),
                unmapped: book.unmapped_personas,
                pending_segments: 0,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
struct SetVoiceMapQuery {
    #[serde(default)]
    initial: bool,
}

#[derive(Debug, Deserialize)]
struct SetVoiceMapRequest {
    bindings: Vec<VoiceBinding>,
}

/// `POST /api/books/:id/voice-map?initial=true|false` — bind personas to
/// provider voices. `initial=true` is the one gate-opening call per book;
/// every later call is a routine update (§4.3/§4.5).
async fn set_voice_map(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SetVoiceMapQuery>,
    Json(request): Json<SetVoiceMapRequest>,
) -> Result<StatusCode, ServerError> {
    let voice_map = VoiceMap::new(&id, request.bindings);
    state.orchestrator.apply_voice_mapping(&id, voice_map, query.initial).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn download_bundle(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ServerError> {
    let cancel = CancellationToken::new();
    let book = state.repository.get_book(&id, &cancel).await?;
    let chapters: Vec<Chapter> = state.repository.list_chapters(&id, &cancel).await?;
    let segments = state.repository.list_segments(&id, &cancel).await?;
    let voice_map = state.repository.get_voice_map(&id, &cancel).await?;

    let shard_size = state.config.read().server.bundle_shard_size;
    let bytes = crate::bundle::build_bundle(&book, &chapters, &segments, &voice_map, state.storage.as_ref(), shard_size).await?;

    let filename = format!("{id}.zip");
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}

async fn cancel_book(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ServerError> {
    state.orchestrator.cancel(&id)?;
    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use narrata_config::Settings;
    use narrata_core::traits::llm::{BatchSegmentResult, LanguageModel, LlmError, ParagraphContext, RawSegment};
    use narrata_core::traits::tts::{AudioFormat, SynthesisResult, TextToSpeech, TtsError, VoiceInfo};
    use narrata_repository::{InMemoryBlobStorage, InMemoryBookRepository};
    use std::sync::Arc;

    #[derive(Default)]
    struct NoopLanguageModel;

    #[async_trait]
    impl LanguageModel for NoopLanguageModel {
        async fn segment(&self, _paragraph: &ParagraphContext, _known_personas: &[String]) -> Result<Vec<RawSegment>, LlmError> {
            Ok(Vec::new())
        }

        async fn batch_segment(&self, _paragraphs: &[ParagraphContext], _known_personas: &[String]) -> Result<Vec<BatchSegmentResult>, LlmError> {
            Ok(Vec::new())
        }

        fn provider_name(&self) -> &str {
            "noop"
        }
    }

    #[derive(Default)]
    struct NoopTextToSpeech;

    #[async_trait]
    impl TextToSpeech for NoopTextToSpeech {
        async fn synthesize(&self, _text: &str, _voice_id: &str, _language: &str, _voice_description: &str) -> Result<SynthesisResult, TtsError> {
            Ok(SynthesisResult { audio_bytes: Vec::new(), format: AudioFormat::Mp3, timestamps: None })
        }

        async fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError> {
            Ok(Vec::new())
        }

        fn provider_name(&self) -> &str {
            "noop"
        }
    }

    fn test_state() -> AppState {
        let handle = crate::telemetry::init_metrics();
        AppState::new(
            Settings::default(),
            Arc::new(InMemoryBookRepository::new()),
            Arc::new(InMemoryBlobStorage::new()),
            Arc::new(NoopLanguageModel),
            Arc::new(NoopTextToSpeech),
            handle,
        )
    }

    #[test]
    fn test_router_creation() {
        let state = test_state();
        let _router = create_router(state);
    }
}
