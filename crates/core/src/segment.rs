//! Segment: the unit of synthesis, and the dense id allocator that stamps them

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Precision of a timestamp item attached to a synthesized segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPrecision {
    Word,
    Sentence,
}

/// A single aligned token/word/sentence within a segment's audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampItem {
    pub token: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Timestamp list returned by the TTS provider for a synthesized segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamps {
    pub precision: TimestampPrecision,
    pub items: Vec<TimestampItem>,
}

impl Timestamps {
    /// Validate the §6 ordering invariant: `start_i <= end_i <= start_{i+1}`
    pub fn is_monotonic(&self) -> bool {
        let mut prev_end = 0u64;
        for item in &self.items {
            if item.start_ms > item.end_ms || item.start_ms < prev_end {
                return false;
            }
            prev_end = item.end_ms;
        }
        true
    }
}

/// Bookkeeping recorded alongside a synthesized segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub segmenter_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl ProcessingMetadata {
    pub fn new(segmenter_version: impl Into<String>) -> Self {
        Self {
            segmenter_version: segmenter_version.into(),
            tts_provider: None,
            generated_at: None,
        }
    }
}

/// A unit of synthesis: one persona speaking one piece of text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub book_id: String,
    pub chapter_id: String,
    pub toc_path: Vec<String>,
    pub text: String,
    pub language: String,
    /// Canonical persona id (post-registry normalization)
    pub person: String,
    pub voice_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
    pub metadata: ProcessingMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preceding_paragraph_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following_paragraph_id: Option<String>,
}

impl Segment {
    /// A segment is eligible for TTS iff its person has an assigned voice;
    /// this constructor only fills fields available at segmentation time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        book_id: impl Into<String>,
        chapter_id: impl Into<String>,
        toc_path: Vec<String>,
        text: impl Into<String>,
        language: impl Into<String>,
        person: impl Into<String>,
        voice_description: impl Into<String>,
        segmenter_version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            book_id: book_id.into(),
            chapter_id: chapter_id.into(),
            toc_path,
            text: text.into(),
            language: language.into(),
            person: person.into(),
            voice_description: voice_description.into(),
            voice_id: None,
            timestamps: None,
            metadata: ProcessingMetadata::new(segmenter_version),
            preceding_paragraph_id: None,
            following_paragraph_id: None,
        }
    }

    pub fn apply_synthesis(&mut self, voice_id: impl Into<String>, timestamps: Option<Timestamps>, provider: impl Into<String>) {
        self.voice_id = Some(voice_id.into());
        self.timestamps = timestamps;
        self.metadata.tts_provider = Some(provider.into());
        self.metadata.generated_at = Some(Utc::now());
    }
}

/// Formats a dense, gap-free segment id of the form `seg_NNNNN`
pub fn format_segment_id(n: u64) -> String {
    format!("seg_{n:05}")
}

/// Single-counter allocator guaranteeing dense, gap-free segment ids per book.
///
/// Guarded by a `parking_lot::Mutex` rather than an async lock: the critical
/// section is a single increment, never held across an await point.
#[derive(Clone)]
pub struct SegmentIdAllocator {
    next: Arc<Mutex<u64>>,
}

impl SegmentIdAllocator {
    pub fn new() -> Self {
        Self {
            next: Arc::new(Mutex::new(1)),
        }
    }

    /// Allocate the next dense id
    pub fn allocate(&self) -> String {
        let mut guard = self.next.lock();
        let id = format_segment_id(*guard);
        *guard += 1;
        id
    }
}

impl Default for SegmentIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_gap_free() {
        let alloc = SegmentIdAllocator::new();
        let ids: Vec<String> = (0..5).map(|_| alloc.allocate()).collect();
        assert_eq!(
            ids,
            vec!["seg_00001", "seg_00002", "seg_00003", "seg_00004", "seg_00005"]
        );
    }

    #[test]
    fn timestamps_monotonicity() {
        let good = Timestamps {
            precision: TimestampPrecision::Word,
            items: vec![
                TimestampItem { token: "a".into(), start_ms: 0, end_ms: 100 },
                TimestampItem { token: "b".into(), start_ms: 100, end_ms: 200 },
            ],
        };
        assert!(good.is_monotonic());

        let bad = Timestamps {
            precision: TimestampPrecision::Word,
            items: vec![
                TimestampItem { token: "a".into(), start_ms: 0, end_ms: 100 },
                TimestampItem { token: "b".into(), start_ms: 50, end_ms: 200 },
            ],
        };
        assert!(!bad.is_monotonic());
    }

    #[test]
    fn segment_eligible_after_synthesis() {
        let mut seg = Segment::new("seg_00001", "b1", "ch1", vec![], "Hello.", "en", "narrator", "neutral", "v1");
        assert!(seg.voice_id.is_none());
        seg.apply_synthesis("voice-1", None, "acme-tts");
        assert_eq!(seg.voice_id.as_deref(), Some("voice-1"));
        assert!(seg.metadata.generated_at.is_some());
    }
}
