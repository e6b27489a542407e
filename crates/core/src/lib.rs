//! Core domain types and capability traits for the book narration pipeline
//!
//! This crate provides the foundations shared by every other crate:
//! - The `Book` / `Chapter` / `Segment` / `VoiceMap` data model (§3)
//! - The published `PipelineStatus` progress structure (§4.5)
//! - Capability traits for the external collaborators (§6): `LanguageModel`,
//!   `TextToSpeech`, `BookRepository`, `BlobStorage`
//! - The shared `CancellationToken` and dense `SegmentIdAllocator`
//! - The crate-wide `Error`/`Result`

pub mod book;
pub mod cancel;
pub mod chapter;
pub mod error;
pub mod segment;
pub mod status;
pub mod traits;
pub mod voice_map;

pub use book::{Book, BookCounters, BookStatus};
pub use cancel::CancellationToken;
pub use chapter::Chapter;
pub use error::{Error, Result};
pub use segment::{
    format_segment_id, ProcessingMetadata, Segment, SegmentIdAllocator, TimestampItem,
    TimestampPrecision, Timestamps,
};
pub use status::{PipelineStatus, StageProgress, StageState};
pub use traits::{
    AudioFormat, BatchSegmentResult, BlobStorage, BookRepository, LanguageModel, LlmError,
    LlmErrorKind, ParagraphContext, RawSegment, SynthesisResult, TextToSpeech, TtsError, VoiceInfo,
};
pub use voice_map::{VoiceBinding, VoiceMap};
