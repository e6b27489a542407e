//! Chapter: an ordered, immutable sequence of paragraphs

use serde::{Deserialize, Serialize};

/// A single chapter of a book, immutable after parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub book_id: String,
    pub index: usize,
    /// Table-of-contents breadcrumb, e.g. `["Part II", "Chapter 4"]`
    pub toc_path: Vec<String>,
    pub paragraphs: Vec<String>,
}

impl Chapter {
    pub fn new(id: impl Into<String>, book_id: impl Into<String>, index: usize, toc_path: Vec<String>, paragraphs: Vec<String>) -> Self {
        Self {
            id: id.into(),
            book_id: book_id.into(),
            index,
            toc_path,
            paragraphs,
        }
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }
}
