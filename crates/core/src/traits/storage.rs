//! Blob storage capability trait (§6 "Storage") — content-addressed by path.
//! Paths use `/` separators and follow the layout fixed in §6:
//! `books/<book_id>/audio/<segment_id>.<ext>`,
//! `books/<book_id>/segments/<segment_id>.json`,
//! `books/<book_id>/voice-map.json`.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BlobStorage: Send + Sync + 'static {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()>;
    async fn get(&self, path: &str) -> Result<Vec<u8>>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Canonical audio path for a segment, as specified in §6
pub fn audio_path(book_id: &str, segment_id: &str, ext: &str) -> String {
    format!("books/{book_id}/audio/{segment_id}.{ext}")
}

/// Canonical metadata path for a segment, as specified in §6
pub fn segment_metadata_path(book_id: &str, segment_id: &str) -> String {
    format!("books/{book_id}/segments/{segment_id}.json")
}

/// Canonical voice map path for a book, as specified in §6
pub fn voice_map_path(book_id: &str) -> String {
    format!("books/{book_id}/voice-map.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_use_forward_slashes() {
        assert_eq!(audio_path("b1", "seg_00001", "mp3"), "books/b1/audio/seg_00001.mp3");
        assert_eq!(segment_metadata_path("b1", "seg_00001"), "books/b1/segments/seg_00001.json");
        assert_eq!(voice_map_path("b1"), "books/b1/voice-map.json");
    }
}
