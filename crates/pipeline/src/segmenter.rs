//! Segmenter Stage (C3): consumes chapters in fixed-size paragraph batches,
//! invokes the LLM, canonicalizes and classifies each returned segment, and
//! enforces the initial voice-mapping gate (§4.3).

use std::sync::Arc;

use narrata_core::traits::llm::{LanguageModel, LlmErrorKind, ParagraphContext, RawSegment};
use narrata_core::traits::repository::BookRepository;
use narrata_core::{CancellationToken, Chapter, Segment};

use crate::events::MappingNeededEvent;
use crate::state::BookState;

const SEGMENTER_VERSION: &str = "narrata-segmenter/1";
const FALLBACK_PERSON: &str = "narrator";
const FALLBACK_VOICE_DESCRIPTION: &str = "neutral";

struct SegmenterCtx {
    state: Arc<BookState>,
    llm: Arc<dyn LanguageModel>,
}

/// Runs to completion (or cancellation) processing every chapter's
/// paragraphs. Returns once segmentation is done or cancelled.
pub async fn run_segmenter(
    state: Arc<BookState>,
    llm: Arc<dyn LanguageModel>,
    chapters: Vec<Chapter>,
) {
    let ctx = SegmenterCtx { state: state.clone(), llm };
    let mut initial_mapping_emitted = false;

    {
        let mut status = state.status.lock();
        status.segmenting.start();
    }
    state.publish().await;

    'chapters: for chapter in &chapters {
        let batch_size = ctx.state.config.segmentation_batch_size.max(1);
        let mut index = 0usize;
        while index < chapter.paragraphs.len() {
            if ctx.state.cancel.is_cancelled() {
                break 'chapters;
            }

            let end = (index + batch_size).min(chapter.paragraphs.len());
            let batch = build_batch(chapter, index, end, &ctx.state);
            process_batch(&ctx, chapter, batch, 0).await;

            let total_segments = ctx.state.segments.lock().len();
            {
                let mut status = ctx.state.status.lock();
                let current = status.segmenting.current + (end - index);
                status.segmenting.advance(current, None);
                status.synthesizing.advance(0, Some(total_segments));
            }
            ctx.state.publish().await;

            if !initial_mapping_emitted && !ctx.state.gate.is_done() {
                let total_segments = ctx.state.segments.lock().len();
                if total_segments >= ctx.state.config.initial_gate {
                    initial_mapping_emitted = true;
                    let personas = ctx.state.persona_registry.known_canonicals();
                    let _ = ctx
                        .state
                        .mapping_needed_tx
                        .send(MappingNeededEvent {
                            book_id: ctx.state.book_id.clone(),
                            initial: true,
                            personas,
                        })
                        .await;
                    tracing::info!(book_id = %ctx.state.book_id, "initial mapping gate reached, blocking segmentation");
                    let gate_opened_at = std::time::Instant::now();
                    tokio::select! {
                        _ = ctx.state.gate.wait() => {}
                        _ = ctx.state.cancel.cancelled() => {}
                    }
                    metrics::histogram!("narrata_gate_open_latency_seconds", "book_id" => ctx.state.book_id.clone())
                        .record(gate_opened_at.elapsed().as_secs_f64());
                    tracing::info!(book_id = %ctx.state.book_id, "initial mapping applied, resuming segmentation");
                }
            }

            index = end;
        }
    }

    let mut status = state.status.lock();
    if state.cancel.is_cancelled() {
        status.segmenting.fail("cancelled");
    } else {
        status.segmenting.complete();
    }
    drop(status);
    state.publish().await;
}

fn build_batch(chapter: &Chapter, start: usize, end: usize, state: &BookState) -> Vec<ParagraphContext> {
    let before = state.config.context_before;
    let after = state.config.context_after;
    (start..end)
        .map(|i| {
            let context_before = (i.saturating_sub(before)..i)
                .map(|j| chapter.paragraphs[j].clone())
                .collect();
            let context_after = ((i + 1)..(i + 1 + after).min(chapter.paragraphs.len()))
                .map(|j| chapter.paragraphs[j].clone())
                .collect();
            ParagraphContext {
                index: i,
                text: chapter.paragraphs[i].clone(),
                context_before,
                context_after,
            }
        })
        .collect()
}

/// Races `fut` against cancellation so an in-flight provider call never
/// outlives a cancelled book (spec §5 "in-flight RPCs must be cancellable").
/// Returns `None` if cancellation won first.
async fn race_cancel<F: std::future::Future>(fut: F, cancel: &CancellationToken) -> Option<F::Output> {
    tokio::select! {
        result = fut => Some(result),
        _ = cancel.cancelled() => None,
    }
}

async fn process_batch(ctx: &SegmenterCtx, chapter: &Chapter, batch: Vec<ParagraphContext>, attempt: u32) {
    if ctx.state.cancel.is_cancelled() || batch.is_empty() {
        return;
    }

    let known = ctx.state.persona_registry.known_canonicals();
    let Some(batch_result) = race_cancel(ctx.llm.batch_segment(&batch, &known), &ctx.state.cancel).await else {
        return;
    };

    match batch_result {
        Ok(results) => {
            for paragraph in &batch {
                let segments = results
                    .iter()
                    .find(|r| r.paragraph_index == paragraph.index)
                    .map(|r| r.segments.clone())
                    .unwrap_or_default();

                if segments.is_empty() {
                    emit_fallback(ctx, chapter, paragraph).await;
                } else {
                    for raw in segments {
                        emit_segment(ctx, chapter, raw).await;
                    }
                }
            }
        }
        Err(e) if e.kind == LlmErrorKind::TokenLimit => {
            if batch.len() > 1 && attempt < ctx.state.config.max_retries {
                let mid = batch.len() / 2;
                let (left, right) = batch.split_at(mid);
                Box::pin(process_batch(ctx, chapter, left.to_vec(), attempt + 1)).await;
                Box::pin(process_batch(ctx, chapter, right.to_vec(), attempt + 1)).await;
            } else {
                for paragraph in &batch {
                    emit_fallback(ctx, chapter, paragraph).await;
                }
            }
        }
        Err(e) => {
            tracing::warn!(book_id = %ctx.state.book_id, error = %e, "batch segmentation failed, falling back to per-paragraph calls");
            for paragraph in &batch {
                if ctx.state.cancel.is_cancelled() {
                    return;
                }
                let Some(result) = race_cancel(ctx.llm.segment(paragraph, &known), &ctx.state.cancel).await else {
                    return;
                };
                match result {
                    Ok(segments) if !segments.is_empty() => {
                        for raw in segments {
                            emit_segment(ctx, chapter, raw).await;
                        }
                    }
                    Ok(_) => emit_fallback(ctx, chapter, paragraph).await,
                    Err(e) => {
                        tracing::warn!(book_id = %ctx.state.book_id, paragraph = paragraph.index, error = %e, "per-paragraph fallback failed");
                        emit_fallback(ctx, chapter, paragraph).await;
                    }
                }
            }
        }
    }
}

async fn emit_fallback(ctx: &SegmenterCtx, chapter: &Chapter, paragraph: &ParagraphContext) {
    emit_segment(
        ctx,
        chapter,
        RawSegment {
            text: paragraph.text.clone(),
            person: FALLBACK_PERSON.to_string(),
            language: ctx.state.language.clone(),
            voice_description: FALLBACK_VOICE_DESCRIPTION.to_string(),
        },
    )
    .await;
}

async fn emit_segment(ctx: &SegmenterCtx, chapter: &Chapter, raw: RawSegment) {
    let (canonical, is_new) = ctx.state.persona_registry.register_reporting_new(&raw.person);
    let id = ctx.state.segment_ids.allocate();
    let segment = Segment::new(
        id,
        ctx.state.book_id.clone(),
        chapter.id.clone(),
        chapter.toc_path.clone(),
        raw.text,
        raw.language,
        canonical.clone(),
        raw.voice_description,
        SEGMENTER_VERSION,
    );

    if let Err(e) = ctx.state.repository.save_segment(&segment, &ctx.state.cancel).await {
        tracing::warn!(book_id = %ctx.state.book_id, segment_id = %segment.id, error = %e, "failed to persist segment");
    }

    metrics::counter!("narrata_segments_produced_total", "book_id" => ctx.state.book_id.clone()).increment(1);
    ctx.state.segments.lock().push(segment.clone());

    // Before the initial gate opens, segments accumulate in the in-memory
    // list only; `apply_voice_mapping`'s initial call is solely responsible
    // for queueing them, exactly once, per §4.5.
    if ctx.state.gate.is_done() {
        let is_mapped = ctx.state.persona_registry.is_mapped(&canonical);
        ctx.state.queue.enqueue(segment, is_mapped);
    }

    if ctx.state.gate.is_done() && is_new {
        let _ = ctx
            .state
            .mapping_needed_tx
            .send(MappingNeededEvent {
                book_id: ctx.state.book_id.clone(),
                initial: false,
                personas: vec![canonical],
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use narrata_config::PipelineConfig;
    use narrata_core::traits::llm::{BatchSegmentResult, LlmError};
    use narrata_core::PipelineStatus;
    use std::sync::Mutex as StdMutex;

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

    /// Rejects any batch larger than one paragraph with `TokenLimit`;
    /// records every batch size it was called with.
    struct TokenLimitUntilSingleLlm {
        calls: Arc<StdMutex<Vec<usize>>>,
    }

    #[async_trait]
    impl LanguageModel for TokenLimitUntilSingleLlm {
        async fn segment(&self, paragraph: &ParagraphContext, _known: &[String]) -> Result<Vec<RawSegment>, LlmError> {
            Ok(vec![RawSegment {
                text: paragraph.text.clone(),
                person: "narrator".to_string(),
                language: "en".to_string(),
                voice_description: "neutral".to_string(),
            }])
        }

        async fn batch_segment(&self, paragraphs: &[ParagraphContext], _known: &[String]) -> Result<Vec<BatchSegmentResult>, LlmError> {
            self.calls.lock().unwrap().push(paragraphs.len());
            if paragraphs.len() > 1 {
                Err(LlmError::token_limit("batch too large"))
            } else {
                Ok(paragraphs
                    .iter()
                    .map(|p| BatchSegmentResult {
                        paragraph_index: p.index,
                        segments: vec![RawSegment {
                            text: p.text.clone(),
                            person: "narrator".to_string(),
                            language: "en".to_string(),
                            voice_description: "neutral".to_string(),
                        }],
                    })
                    .collect())
            }
        }

        fn provider_name(&self) -> &str {
            "token-limit-until-single"
        }
    }

    #[tokio::test]
    async fn token_limit_recursively_halves_to_single_paragraph() {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let llm = Arc::new(TokenLimitUntilSingleLlm { calls: calls.clone() });
        let state = test_state(PipelineConfig::default());
        let chapter = Chapter::new(
            "ch1",
            "book-1",
            0,
            vec![],
            vec!["a.".to_string(), "b.".to_string(), "c.".to_string(), "d.".to_string()],
        );
        let batch = build_batch(&chapter, 0, 4, &state);
        let ctx = SegmenterCtx { state: state.clone(), llm };

        process_batch(&ctx, &chapter, batch, 0).await;

        // 4 shrinks to 2+2, each of which shrinks to 1+1: every call below
        // size 1 fails, every size-1 call succeeds.
        assert_eq!(*calls.lock().unwrap(), vec![4, 2, 1, 1, 2, 1, 1]);
        assert_eq!(state.segments.lock().len(), 4);
    }

    #[tokio::test]
    async fn token_limit_stops_recursing_past_max_retries() {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let llm = Arc::new(TokenLimitUntilSingleLlm { calls: calls.clone() });
        let mut config = PipelineConfig::default();
        config.max_retries = 1;
        let state = test_state(config);
        let chapter = Chapter::new("ch1", "book-1", 0, vec![], vec!["a.".to_string(), "b.".to_string(), "c.".to_string(), "d.".to_string()]);
        let batch = build_batch(&chapter, 0, 4, &state);
        let ctx = SegmenterCtx { state: state.clone(), llm };

        process_batch(&ctx, &chapter, batch, 0).await;

        // Budget of 1 retry: the initial call (attempt 0) may still split
        // once, but the resulting halves (attempt 1) fall straight to the
        // per-paragraph fallback instead of calling the LLM again.
        assert_eq!(*calls.lock().unwrap(), vec![4, 2, 2]);
        assert_eq!(state.segments.lock().len(), 4);
    }
}
