//! TTS Stage (C4): a pool of N cooperating workers draining the `mapped`
//! bucket of the segment queue (§4.4).

use std::sync::Arc;
use std::time::Duration;

use narrata_core::status::StageState;
use narrata_core::traits::repository::BookRepository;
use narrata_core::traits::storage::{audio_path, BlobStorage};
use narrata_core::traits::tts::TextToSpeech;

use crate::state::BookState;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns `tts_concurrency` workers and waits for all of them to finish.
/// Callers should await this inside its own `tokio::spawn`ed task.
pub async fn run_tts_pool(
    state: Arc<BookState>,
    tts: Arc<dyn TextToSpeech>,
    storage: Arc<dyn BlobStorage>,
) {
    {
        let mut status = state.status.lock();
        status.synthesizing.start();
    }
    state.publish().await;

    let worker_count = state.config.tts_concurrency.max(1);
    let mut handles = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let state = state.clone();
        let tts = tts.clone();
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            run_worker(worker_id, state, tts, storage).await;
        }));
    }

    for handle in handles {
        // Re-propagate a panicking worker by unwinding this task too, so the
        // panic surfaces through the orchestrator's join on `run_tts_pool`
        // itself instead of being swallowed at this inner join.
        if let Err(e) = handle.await {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
        }
    }

    let mut status = state.status.lock();
    if state.cancel.is_cancelled() {
        status.synthesizing.fail("cancelled");
    } else {
        status.synthesizing.complete();
    }
    drop(status);
    state.publish().await;
}

async fn run_worker(worker_id: usize, state: Arc<BookState>, tts: Arc<dyn TextToSpeech>, storage: Arc<dyn BlobStorage>) {
    loop {
        if state.cancel.is_cancelled() {
            tracing::debug!(book_id = %state.book_id, worker_id, "tts worker exiting on cancellation");
            return;
        }

        let Some(mut segment) = state.queue.dequeue_next() else {
            let segmenting_done = {
                let status = state.status.lock();
                matches!(status.segmenting.status, StageState::Completed | StageState::Failed)
            };
            let (mapped, unmapped) = state.queue.counts();
            if segmenting_done && mapped == 0 && unmapped == 0 {
                tracing::debug!(book_id = %state.book_id, worker_id, "tts worker exiting, queue drained");
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            continue;
        };

        let Some(voice_id) = state.persona_registry.voice_of(&segment.person) else {
            tracing::warn!(book_id = %state.book_id, segment_id = %segment.id, person = %segment.person, "skipping segment with no bound voice");
            metrics::counter!("narrata_segments_skipped_total", "book_id" => state.book_id.clone(), "reason" => "unmapped").increment(1);
            continue;
        };

        let synth_result = tokio::select! {
            result = tts.synthesize(&segment.text, &voice_id, &segment.language, &segment.voice_description) => result,
            _ = state.cancel.cancelled() => {
                tracing::debug!(book_id = %state.book_id, worker_id, segment_id = %segment.id, "tts worker exiting mid-request on cancellation");
                return;
            }
        };

        match synth_result {
            Ok(result) => {
                let path = audio_path(&state.book_id, &segment.id, result.format.extension());
                if let Err(e) = storage.put(&path, result.audio_bytes).await {
                    tracing::warn!(book_id = %state.book_id, segment_id = %segment.id, error = %e, "failed to persist audio, skipping segment");
                    metrics::counter!("narrata_segments_skipped_total", "book_id" => state.book_id.clone(), "reason" => "storage_failure").increment(1);
                    continue;
                }

                segment.apply_synthesis(voice_id, result.timestamps, tts.provider_name());
                if let Err(e) = state.repository.save_segment(&segment, &state.cancel).await {
                    tracing::warn!(book_id = %state.book_id, segment_id = %segment.id, error = %e, "failed to persist synthesized segment metadata");
                }

                {
                    let mut segments = state.segments.lock();
                    if let Some(existing) = segments.iter_mut().find(|s| s.id == segment.id) {
                        *existing = segment;
                    }
                }

                metrics::counter!("narrata_segments_synthesized_total", "book_id" => state.book_id.clone()).increment(1);
                let total_known = state.segments.lock().len();
                {
                    let mut status = state.status.lock();
                    let current = status.synthesizing.current + 1;
                    status.synthesizing.advance(current, Some(total_known));
                }
                state.publish().await;
            }
            Err(e) => {
                tracing::warn!(book_id = %state.book_id, segment_id = %segment.id, error = %e, "tts synthesis failed, skipping segment (single-try policy)");
                metrics::counter!("narrata_segments_skipped_total", "book_id" => state.book_id.clone(), "reason" => "tts_failure").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use narrata_config::PipelineConfig;
    use narrata_core::traits::tts::{SynthesisResult, TtsError, VoiceInfo};
    use narrata_core::{PipelineStatus, Segment};
    use narrata_repository::InMemoryBlobStorage;

    fn test_state(config: PipelineConfig) -> Arc<BookState> {
        let (mapping_needed_tx, _rx) = tokio::sync::mpsc::channel(16);
        Arc::new(BookState {
            book_id: "book-1".to_string(),
            language: "en".to_string(),
            config,
            persona_registry: narrata_persona::PersonaRegistry::new(),
            queue: narrata_queue::SegmentQueue::new(),
            segment_ids: narrata_core::SegmentIdAllocator::new(),
            segments: Arc::new(parking_lot::Mutex::new(Vec::new())),
            status: Arc::new(parking_lot::Mutex::new(PipelineStatus::new("book-1", 0))),
            gate: crate::gate::MappingGate::new(),
            cancel: narrata_core::CancellationToken::new(),
            mapping_needed_tx,
            repository: Arc::new(narrata_repository::InMemoryBookRepository::new()),
            progress_cb: Arc::new(|_| {}),
        })
    }

    struct AlwaysFailTts;

    #[async_trait]
    impl TextToSpeech for AlwaysFailTts {
        async fn synthesize(&self, _text: &str, _voice_id: &str, _language: &str, _voice_description: &str) -> Result<SynthesisResult, TtsError> {
            Err(TtsError::Transient("provider unavailable".to_string()))
        }

        async fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError> {
            Ok(vec![])
        }

        fn provider_name(&self) -> &str {
            "always-fail"
        }
    }

    fn counter_total(snapshot: metrics_util::debugging::Snapshot, name: &str) -> u64 {
        snapshot
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| {
                if key.key().name() == name {
                    if let DebugValue::Counter(v) = value {
                        Some(v)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .sum()
    }

    #[tokio::test]
    async fn tts_failure_skips_segment_and_records_metric() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder.install().expect("install debugging recorder");

        let state = test_state(PipelineConfig::default());
        {
            let mut status = state.status.lock();
            status.segmenting.complete();
        }
        state.persona_registry.register("narrator");
        state.persona_registry.bind("narrator", "voice-1");
        state.queue.enqueue(
            Segment::new("seg_00001", "book-1", "ch1", vec![], "hello", "en", "narrator", "neutral", "v1"),
            true,
        );

        run_tts_pool(state.clone(), Arc::new(AlwaysFailTts), Arc::new(InMemoryBlobStorage::new())).await;

        assert_eq!(state.queue.counts(), (0, 0));
        assert_eq!(counter_total(snapshotter.snapshot(), "narrata_segments_skipped_total"), 1);
    }

    #[tokio::test]
    async fn unmapped_voice_skips_without_calling_tts() {
        let state = test_state(PipelineConfig::default());
        {
            let mut status = state.status.lock();
            status.segmenting.complete();
        }
        // Registered but never bound: `voice_of` returns `None`.
        state.persona_registry.register("narrator");
        state.queue.enqueue(
            Segment::new("seg_00001", "book-1", "ch1", vec![], "hello", "en", "narrator", "neutral", "v1"),
            true,
        );

        run_tts_pool(state.clone(), Arc::new(AlwaysFailTts), Arc::new(InMemoryBlobStorage::new())).await;

        assert_eq!(state.queue.counts(), (0, 0));
        assert!(state.segments.lock().is_empty());
    }
}
