//! Events the orchestrator forwards to the outside world as the segmenter
//! discovers personas (§4.3 gate contract).

/// A request for a human to bind one or more personas to a provider voice.
#[derive(Debug, Clone)]
pub struct MappingNeededEvent {
    pub book_id: String,
    /// `true` for the one gate-triggered event per book; `false` for every
    /// persona discovered after the gate has opened.
    pub initial: bool,
    pub personas: Vec<String>,
}
