//! Published pipeline progress: the structure handed to progress callbacks
//! and returned by `get_status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one sub-stage of the pipeline (segmenting / synthesizing / ready)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Progress of a single sub-stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub current: usize,
    pub total: usize,
    pub status: StageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageProgress {
    pub fn pending(total: usize) -> Self {
        Self {
            current: 0,
            total,
            status: StageState::Pending,
            message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Percentage complete, 0.0 when `total` is zero rather than dividing by zero
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            if self.status == StageState::Completed { 100.0 } else { 0.0 }
        } else {
            (self.current as f32 / self.total as f32 * 100.0).min(100.0)
        }
    }

    pub fn start(&mut self) {
        self.status = StageState::Running;
        self.started_at = Some(Utc::now());
    }

    /// Advance `current`; never moves it backwards and may refine `total`
    /// upward as it becomes known (§5 ordering guarantee).
    pub fn advance(&mut self, current: usize, total: Option<usize>) {
        if current > self.current {
            self.current = current;
        }
        if let Some(total) = total {
            if total > self.total {
                self.total = total;
            }
        }
    }

    pub fn complete(&mut self) {
        self.status = StageState::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = StageState::Failed;
        self.message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }
}

/// The full published pipeline status for a book, covering all three
/// overlapping sub-stages described in §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub book_id: String,
    pub segmenting: StageProgress,
    pub synthesizing: StageProgress,
    pub ready: StageProgress,
    pub updated_at: DateTime<Utc>,
}

impl PipelineStatus {
    pub fn new(book_id: impl Into<String>, total_paragraphs: usize) -> Self {
        Self {
            book_id: book_id.into(),
            segmenting: StageProgress::pending(total_paragraphs),
            synthesizing: StageProgress::pending(0),
            ready: StageProgress::pending(1),
            updated_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_with_zero_total() {
        let progress = StageProgress::pending(0);
        assert_eq!(progress.percentage(), 0.0);
    }

    #[test]
    fn percentage_clamped_and_proportional() {
        let mut progress = StageProgress::pending(4);
        progress.advance(2, None);
        assert_eq!(progress.percentage(), 50.0);
        progress.advance(10, None);
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    fn advance_never_goes_backwards() {
        let mut progress = StageProgress::pending(10);
        progress.advance(5, None);
        progress.advance(3, None);
        assert_eq!(progress.current, 5);
    }

    #[test]
    fn total_refines_upward_only() {
        let mut progress = StageProgress::pending(5);
        progress.advance(0, Some(10));
        assert_eq!(progress.total, 10);
        progress.advance(0, Some(8));
        assert_eq!(progress.total, 10);
    }

    #[test]
    fn round_trip_preserves_fields() {
        let status = PipelineStatus::new("b1", 10);
        let json = serde_json::to_string(&status).unwrap();
        let back: PipelineStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back.book_id, status.book_id);
        assert_eq!(back.segmenting.total, status.segmenting.total);
    }
}
