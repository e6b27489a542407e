//! Segment priority queue (C2): a dual ordered collection over `mapped`
//! and `unmapped` buckets.
//!
//! FIFO within `mapped` for segments enqueued while already mapped;
//! `promote` jumps a persona's backlog ahead of whatever is already queued,
//! since promoted segments are typically blocking current playback.

use narrata_core::Segment;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    mapped: VecDeque<Segment>,
    unmapped: VecDeque<Segment>,
}

/// Per-book segment queue. A single lock guards both buckets.
#[derive(Clone)]
pub struct SegmentQueue {
    inner: Arc<Mutex<Inner>>,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Append `segment` to the bucket matching `is_mapped`.
    pub fn enqueue(&self, segment: Segment, is_mapped: bool) {
        let mut inner = self.inner.lock();
        if is_mapped {
            inner.mapped.push_back(segment);
        } else {
            inner.unmapped.push_back(segment);
        }
    }

    /// Pop the head of the `mapped` bucket.
    pub fn dequeue_next(&self) -> Option<Segment> {
        self.inner.lock().mapped.pop_front()
    }

    /// Move every segment in `unmapped` whose `person` equals `canonical`
    /// to the head of `mapped`, preserving their relative order among
    /// themselves. Returns how many were promoted.
    pub fn promote(&self, canonical: &str) -> usize {
        let mut inner = self.inner.lock();
        let mut promoted = VecDeque::new();
        let mut remaining = VecDeque::with_capacity(inner.unmapped.len());
        for segment in inner.unmapped.drain(..) {
            if segment.person == canonical {
                promoted.push_back(segment);
            } else {
                remaining.push_back(segment);
            }
        }
        inner.unmapped = remaining;
        let count = promoted.len();
        for segment in promoted.into_iter().rev() {
            inner.mapped.push_front(segment);
        }
        if count > 0 {
            tracing::info!(canonical, count, "promoted segments to mapped bucket");
        }
        count
    }

    /// `(mapped_len, unmapped_len)`.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.mapped.len(), inner.unmapped.len())
    }
}

impl Default for SegmentQueue {
    fn default() -> Self {
        Self::new()
    }
}
