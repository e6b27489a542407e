//! Repository capability trait (§6 "Repository") — persisted CRUD for the
//! book/chapter/segment/voice-map records. This is an external collaborator:
//! the pipeline core depends only on this trait, never on a concrete store.

use crate::book::Book;
use crate::cancel::CancellationToken;
use crate::chapter::Chapter;
use crate::error::Result;
use crate::segment::Segment;
use crate::voice_map::VoiceMap;
use async_trait::async_trait;

#[async_trait]
pub trait BookRepository: Send + Sync + 'static {
    async fn save_book(&self, book: &Book, cancel: &CancellationToken) -> Result<()>;
    async fn get_book(&self, book_id: &str, cancel: &CancellationToken) -> Result<Book>;

    async fn save_chapters(&self, book_id: &str, chapters: &[Chapter], cancel: &CancellationToken) -> Result<()>;
    async fn list_chapters(&self, book_id: &str, cancel: &CancellationToken) -> Result<Vec<Chapter>>;

    async fn save_segment(&self, segment: &Segment, cancel: &CancellationToken) -> Result<()>;
    async fn list_segments(&self, book_id: &str, cancel: &CancellationToken) -> Result<Vec<Segment>>;

    async fn save_voice_map(&self, voice_map: &VoiceMap, cancel: &CancellationToken) -> Result<()>;
    async fn get_voice_map(&self, book_id: &str, cancel: &CancellationToken) -> Result<Option<VoiceMap>>;
}
