//! Capability traits for the pipeline's external collaborators (§6)

pub mod llm;
pub mod repository;
pub mod storage;
pub mod tts;

pub use llm::{BatchSegmentResult, LanguageModel, LlmError, LlmErrorKind, ParagraphContext, RawSegment};
pub use repository::BookRepository;
pub use storage::BlobStorage;
pub use tts::{AudioFormat, SynthesisResult, TextToSpeech, TtsError, VoiceInfo};
