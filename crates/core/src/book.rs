//! Book aggregate: identity, lifecycle status, and running counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a book as it moves through ingestion and narration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Uploaded,
    Parsing,
    Segmenting,
    VoiceMapping,
    Synthesizing,
    Synthesized,
    SynthesisError,
    Error,
}

impl BookStatus {
    /// Terminal states: no further transitions happen once reached
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookStatus::Synthesized | BookStatus::Error)
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookStatus::Uploaded => "uploaded",
            BookStatus::Parsing => "parsing",
            BookStatus::Segmenting => "segmenting",
            BookStatus::VoiceMapping => "voice_mapping",
            BookStatus::Synthesizing => "synthesizing",
            BookStatus::Synthesized => "synthesized",
            BookStatus::SynthesisError => "synthesis_error",
            BookStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Running counters published alongside book status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookCounters {
    pub total_paragraphs: usize,
    pub segmented_paragraphs: usize,
    pub total_segments: usize,
    pub synthesized_segments: usize,
    pub pending_segment_count: usize,
}

/// Identity and live state of an ingested book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub language: String,
    pub status: BookStatus,
    pub counters: BookCounters,
    pub discovered_personas: Vec<String>,
    pub unmapped_personas: Vec<String>,
    pub waiting_for_mapping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Create a freshly uploaded book record
    pub fn new(id: impl Into<String>, title: impl Into<String>, author: impl Into<String>, language: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            language: language.into(),
            status: BookStatus::Uploaded,
            counters: BookCounters::default(),
            discovered_personas: Vec::new(),
            unmapped_personas: Vec::new(),
            waiting_for_mapping: false,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_status(&mut self, status: BookStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = BookStatus::Error;
        self.error = Some(message.into());
        self.updated_at = Utc::now();
    }
}
