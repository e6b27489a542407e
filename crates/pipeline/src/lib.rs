//! Segmentation, TTS, and orchestration stages: C3, C4, C5 of the narration
//! pipeline.

pub mod events;
pub mod gate;
pub mod orchestrator;
pub mod segmenter;
pub mod state;
pub mod tts_stage;

pub use events::MappingNeededEvent;
pub use gate::MappingGate;
pub use orchestrator::{MappingNeededCallback, Orchestrator, PersonaDiscovery, StageDependencies};
pub use state::{BookState, ProgressCallback};
