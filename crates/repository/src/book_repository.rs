//! In-memory `BookRepository`. Reference implementation used by default
//! deployments and tests; a durable store can implement the same trait.

use async_trait::async_trait;
use dashmap::DashMap;
use narrata_core::traits::repository::BookRepository;
use narrata_core::{Book, CancellationToken, Chapter, Error, Result, Segment, VoiceMap};
use std::sync::Arc;

#[derive(Default)]
struct BookEntry {
    book: Book,
    chapters: Vec<Chapter>,
    segments: Vec<Segment>,
    voice_map: Option<VoiceMap>,
}

#[derive(Clone, Default)]
pub struct InMemoryBookRepository {
    books: Arc<DashMap<String, BookEntry>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn save_book(&self, book: &Book, _cancel: &CancellationToken) -> Result<()> {
        self.books
            .entry(book.id.clone())
            .or_insert_with(BookEntry::default)
            .book = book.clone();
        Ok(())
    }

    async fn get_book(&self, book_id: &str, _cancel: &CancellationToken) -> Result<Book> {
        self.books
            .get(book_id)
            .map(|e| e.book.clone())
            .ok_or_else(|| Error::BookNotFound(book_id.to_string()))
    }

    async fn save_chapters(
        &self,
        book_id: &str,
        chapters: &[Chapter],
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.books
            .entry(book_id.to_string())
            .or_insert_with(BookEntry::default)
            .chapters = chapters.to_vec();
        Ok(())
    }

    async fn list_chapters(&self, book_id: &str, _cancel: &CancellationToken) -> Result<Vec<Chapter>> {
        Ok(self
            .books
            .get(book_id)
            .map(|e| e.chapters.clone())
            .unwrap_or_default())
    }

    async fn save_segment(&self, segment: &Segment, _cancel: &CancellationToken) -> Result<()> {
        let mut entry = self
            .books
            .entry(segment.book_id.clone())
            .or_insert_with(BookEntry::default);
        if let Some(existing) = entry.segments.iter_mut().find(|s| s.id == segment.id) {
            *existing = segment.clone();
        } else {
            entry.segments.push(segment.clone());
        }
        Ok(())
    }

    async fn list_segments(&self, book_id: &str, _cancel: &CancellationToken) -> Result<Vec<Segment>> {
        Ok(self
            .books
            .get(book_id)
            .map(|e| e.segments.clone())
            .unwrap_or_default())
    }

    async fn save_voice_map(&self, voice_map: &VoiceMap, _cancel: &CancellationToken) -> Result<()> {
        self.books
            .entry(voice_map.book_id.clone())
            .or_insert_with(BookEntry::default)
            .voice_map = Some(voice_map.clone());
        Ok(())
    }

    async fn get_voice_map(&self, book_id: &str, _cancel: &CancellationToken) -> Result<Option<VoiceMap>> {
        Ok(self.books.get(book_id).and_then(|e| e.voice_map.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrata_core::Book;

    #[tokio::test]
    async fn save_and_get_book_round_trips() {
        let repo = InMemoryBookRepository::new();
        let cancel = CancellationToken::new();
        let book = Book::new("b1", "Title", "Author", "en");
        repo.save_book(&book, &cancel).await.unwrap();
        let fetched = repo.get_book("b1", &cancel).await.unwrap();
        assert_eq!(fetched.title, "Title");
    }

    #[tokio::test]
    async fn get_missing_book_errors() {
        let repo = InMemoryBookRepository::new();
        let cancel = CancellationToken::new();
        assert!(repo.get_book("missing", &cancel).await.is_err());
    }

    #[tokio::test]
    async fn save_segment_upserts_by_id() {
        let repo = InMemoryBookRepository::new();
        let cancel = CancellationToken::new();
        let mut seg = Segment::new("seg_00001", "b1", "ch1", vec![], "hi", "en", "alice", "neutral", "v1");
        repo.save_segment(&seg, &cancel).await.unwrap();
        seg.apply_synthesis("voice-1", None, "acme");
        repo.save_segment(&seg, &cancel).await.unwrap();

        let segments = repo.list_segments("b1", &cancel).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].voice_id.as_deref(), Some("voice-1"));
    }
}
