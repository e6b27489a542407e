//! Orchestrator (C5): owns per-book state, wires up the segmenter and TTS
//! stages, and exposes the public operations described in §4.5.

use std::sync::Arc;

use dashmap::DashMap;
use narrata_config::PipelineConfig;
use narrata_core::traits::llm::LanguageModel;
use narrata_core::traits::repository::BookRepository;
use narrata_core::traits::storage::BlobStorage;
use narrata_core::traits::tts::TextToSpeech;
use narrata_core::{BookStatus, Chapter, Error, PipelineStatus, Result, VoiceMap};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::events::MappingNeededEvent;
use crate::gate::MappingGate;
use crate::segmenter::run_segmenter;
use crate::state::{BookState, ProgressCallback};
use crate::tts_stage::run_tts_pool;

/// Collaborators a book's pipeline run needs; bundled so `start`'s
/// signature stays manageable.
#[derive(Clone)]
pub struct StageDependencies {
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn TextToSpeech>,
    pub repository: Arc<dyn BookRepository>,
    pub storage: Arc<dyn BlobStorage>,
}

/// Callback invoked whenever the registry discovers a persona that needs a
/// human-supplied voice binding.
pub type MappingNeededCallback = Arc<dyn Fn(MappingNeededEvent) + Send + Sync>;

/// Snapshot returned by `get_persona_discovery`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PersonaDiscovery {
    pub discovered: Vec<String>,
    pub mapped: Vec<String>,
    pub unmapped: Vec<String>,
    pub pending_segments: usize,
}

const MAPPING_CHANNEL_CAPACITY: usize = 16;

/// Owns every in-flight book's state. Cheap to clone; hand one `Orchestrator`
/// to every HTTP handler.
#[derive(Clone)]
pub struct Orchestrator {
    books: Arc<DashMap<String, Arc<BookState>>>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            books: Arc::new(DashMap::new()),
            config,
        }
    }

    fn book_state(&self, book_id: &str) -> Result<Arc<BookState>> {
        self.books
            .get(book_id)
            .map(|e| e.clone())
            .ok_or_else(|| Error::NotRunning(book_id.to_string()))
    }

    /// Refuses if a run is already active for `book_id`; otherwise spawns
    /// the segmenter, the TTS pool (gated on initial mapping), and a
    /// completion watcher, then returns immediately.
    pub async fn start(
        &self,
        book_id: impl Into<String>,
        language: impl Into<String>,
        chapters: Vec<Chapter>,
        deps: StageDependencies,
        progress_cb: ProgressCallback,
        mapping_needed_cb: MappingNeededCallback,
    ) -> Result<()> {
        let book_id = book_id.into();
        if self.books.contains_key(&book_id) {
            return Err(Error::AlreadyRunning(book_id));
        }

        let total_paragraphs: usize = chapters.iter().map(|c| c.paragraph_count()).sum();
        let (mapping_needed_tx, mut mapping_needed_rx) = mpsc::channel(MAPPING_CHANNEL_CAPACITY);

        let state = Arc::new(BookState {
            book_id: book_id.clone(),
            language: language.into(),
            config: self.config.clone(),
            persona_registry: narrata_persona::PersonaRegistry::new(),
            queue: narrata_queue::SegmentQueue::new(),
            segment_ids: narrata_core::SegmentIdAllocator::new(),
            segments: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(PipelineStatus::new(&book_id, total_paragraphs))),
            gate: MappingGate::new(),
            cancel: narrata_core::CancellationToken::new(),
            mapping_needed_tx,
            repository: deps.repository.clone(),
            progress_cb,
        });

        self.books.insert(book_id.clone(), state.clone());

        tokio::spawn(async move {
            while let Some(event) = mapping_needed_rx.recv().await {
                mapping_needed_cb(event);
            }
        });

        let seg_state = state.clone();
        let seg_chapters = chapters;
        let llm = deps.llm.clone();
        let seg_handle = tokio::spawn(async move {
            run_segmenter(seg_state, llm, seg_chapters).await;
        });

        let tts_state = state.clone();
        let tts = deps.tts.clone();
        let storage = deps.storage.clone();
        let tts_handle = tokio::spawn(async move {
            // §4.4 "Gate coupling": the TTS stage itself knows nothing of
            // the gate; the orchestrator withholds the worker pool until
            // the initial mapping has been applied.
            tokio::select! {
                _ = tts_state.gate.wait() => {}
                _ = tts_state.cancel.cancelled() => {}
            }
            if !tts_state.cancel.is_cancelled() {
                run_tts_pool(tts_state, tts, storage).await;
            }
        });

        let books = self.books.clone();
        let watcher_state = state;
        tokio::spawn(async move {
            let seg_result = seg_handle.await;
            let tts_result = tts_handle.await;

            let panic_message = match (&seg_result, &tts_result) {
                (Err(e), _) if e.is_panic() => Some(format!("segmenter stage panicked: {e}")),
                (_, Err(e)) if e.is_panic() => Some(format!("tts stage panicked: {e}")),
                _ => None,
            };

            match panic_message {
                Some(message) => fail_on_panic(&watcher_state, message).await,
                None => finalize(&watcher_state).await,
            }
            books.remove(&watcher_state.book_id);
        });

        Ok(())
    }

    /// Merges `voice_map` into the registry, promotes backlog for each
    /// newly-bound persona, and, on the first `initial` call for a book,
    /// performs the once-only "queue every existing segment" action and
    /// opens the gate.
    pub async fn apply_voice_mapping(&self, book_id: &str, voice_map: VoiceMap, is_initial: bool) -> Result<()> {
        let state = self.book_state(book_id)?;

        if let Err(e) = state.repository.save_voice_map(&voice_map, &state.cancel).await {
            tracing::warn!(book_id, error = %e, "failed to persist voice map");
        }

        for binding in &voice_map.bindings {
            state.persona_registry.bind(&binding.persona_id, binding.provider_voice_id.clone());
        }

        if is_initial && state.gate.claim_initial_enqueue() {
            let snapshot = state.segments.lock().clone();
            for segment in snapshot {
                let mapped = state.persona_registry.is_mapped(&segment.person);
                state.queue.enqueue(segment, mapped);
            }
            state.gate.open();

            if let Ok(mut book) = state.repository.get_book(book_id, &state.cancel).await {
                book.mark_status(BookStatus::Synthesizing);
                if let Err(e) = state.repository.save_book(&book, &state.cancel).await {
                    tracing::warn!(book_id, error = %e, "failed to persist status transition to synthesizing");
                }
            }
        }

        for binding in &voice_map.bindings {
            state.queue.promote(&binding.persona_id);
        }

        state.publish().await;
        Ok(())
    }

    pub async fn get_status(&self, book_id: &str) -> Result<PipelineStatus> {
        let state = self.book_state(book_id)?;
        Ok(state.status.lock().clone())
    }

    pub fn get_persona_discovery(&self, book_id: &str) -> Result<PersonaDiscovery> {
        let state = self.book_state(book_id)?;
        let snapshot = state.persona_registry.snapshot();
        let (_, pending_segments) = state.queue.counts();
        Ok(PersonaDiscovery {
            discovered: snapshot.discovered,
            mapped: snapshot.mapped,
            unmapped: snapshot.unmapped,
            pending_segments,
        })
    }

    /// Trips cancellation for `book_id`. The completion watcher evicts the
    /// state once both stages have observed it and exited.
    pub fn cancel(&self, book_id: &str) -> Result<()> {
        let state = self.book_state(book_id)?;
        state.cancel.cancel();
        Ok(())
    }
}

/// §7 item 8 (PipelinePanic): an unhandled fault inside a stage task must
/// surface as book status `error` with a diagnostic, not as a silently
/// discarded `JoinError`. Trips cancellation too so the sibling stage (if
/// still running) winds down instead of synthesizing against half-dead state.
async fn fail_on_panic(state: &Arc<BookState>, message: String) {
    state.cancel.cancel();
    tracing::error!(book_id = %state.book_id, error = %message, "stage task panicked, marking book as error");

    if let Ok(mut book) = state.repository.get_book(&state.book_id, &state.cancel).await {
        book.mark_error(message);
        if let Err(e) = state.repository.save_book(&book, &state.cancel).await {
            tracing::warn!(book_id = %state.book_id, error = %e, "failed to persist panic status");
        }
    }

    state.publish().await;
}

async fn finalize(state: &Arc<BookState>) {
    {
        let mut status = state.status.lock();
        status.ready.start();
        status.ready.complete();
    }

    if !state.cancel.is_cancelled() {
        let segments = state.segments.lock().clone();
        let all_synthesized = segments.iter().all(|s| s.voice_id.is_some());
        let final_status = if all_synthesized { BookStatus::Synthesized } else { BookStatus::SynthesisError };

        if let Ok(mut book) = state.repository.get_book(&state.book_id, &state.cancel).await {
            book.mark_status(final_status);
            book.waiting_for_mapping = false;
            if let Err(e) = state.repository.save_book(&book, &state.cancel).await {
                tracing::warn!(book_id = %state.book_id, error = %e, "failed to persist terminal status");
            }
        }
    }

    state.publish().await;
    tracing::info!(book_id = %state.book_id, "pipeline run finished, evicting state");
}
