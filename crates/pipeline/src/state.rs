//! Per-book in-memory state owned by the orchestrator (§4.5).
//!
//! Exactly one task ever mutates each piece under its own lock: a given
//! segment's record, the persona registry, the queue, and the status
//! struct. The book record in the external repository is mutated only by
//! `publish`, so concurrent callers never race on it beyond a last-write-wins
//! overwrite, which is the accepted policy for `RepositoryFailure` (§7).

use std::sync::Arc;

use chrono::Utc;
use narrata_config::PipelineConfig;
use narrata_core::traits::repository::BookRepository;
use narrata_core::{CancellationToken, PipelineStatus, Segment, SegmentIdAllocator};
use narrata_persona::PersonaRegistry;
use narrata_queue::SegmentQueue;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::events::MappingNeededEvent;
use crate::gate::MappingGate;

pub type ProgressCallback = Arc<dyn Fn(PipelineStatus) + Send + Sync>;

/// Shared state for one in-flight book. Cloned cheaply (everything inside
/// is reference-counted); every stage task holds one.
#[derive(Clone)]
pub struct BookState {
    pub book_id: String,
    pub language: String,
    pub config: PipelineConfig,
    pub persona_registry: PersonaRegistry,
    pub queue: SegmentQueue,
    pub segment_ids: SegmentIdAllocator,
    /// Every segment ever produced, in production order (§4.5: "unbounded
    /// list of all produced segments").
    pub segments: Arc<Mutex<Vec<Segment>>>,
    pub status: Arc<Mutex<PipelineStatus>>,
    pub gate: MappingGate,
    pub cancel: CancellationToken,
    pub mapping_needed_tx: mpsc::Sender<MappingNeededEvent>,
    pub repository: Arc<dyn BookRepository>,
    pub progress_cb: ProgressCallback,
}

impl BookState {
    /// Copy the published status under the lock, hand it to the user
    /// callback, and persist a merged `Book` snapshot to the repository.
    /// Never holds a lock across either call.
    pub async fn publish(&self) {
        let status_copy = {
            let mut status = self.status.lock();
            status.touch();
            status.clone()
        };

        (self.progress_cb)(status_copy.clone());

        let snapshot = self.persona_registry.snapshot();
        let (_, unmapped_count) = self.queue.counts();

        let cancel = self.cancel.clone();
        match self.repository.get_book(&self.book_id, &cancel).await {
            Ok(mut book) => {
                book.counters.total_segments = self.segments.lock().len();
                book.counters.segmented_paragraphs = status_copy.segmenting.current;
                book.counters.total_paragraphs = status_copy.segmenting.total;
                book.counters.synthesized_segments = status_copy.synthesizing.current;
                book.counters.pending_segment_count = unmapped_count;
                book.discovered_personas = snapshot.discovered;
                book.unmapped_personas = snapshot.unmapped;
                book.waiting_for_mapping = !self.gate.is_done();
                book.updated_at = Utc::now();
                if let Err(e) = self.repository.save_book(&book, &cancel).await {
                    tracing::warn!(book_id = %self.book_id, error = %e, "failed to persist progress snapshot");
                }
            }
            Err(e) => {
                tracing::warn!(book_id = %self.book_id, error = %e, "failed to load book for progress snapshot");
            }
        }
    }
}
