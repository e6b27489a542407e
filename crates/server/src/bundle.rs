//! ZIP bundle writer (§6 "ZIP bundle layout"): root `manifest.json`,
//! `toc.json`, `voice-map.json`, and sharded `segments/NNN/<segment_id>.*`
//! with a configurable number of segments per shard, in insertion order.

use std::io::Write;

use chrono::{DateTime, Utc};
use narrata_core::traits::storage::{audio_path, BlobStorage};
use narrata_core::{Book, Chapter, Error, Result, Segment, VoiceMap};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct Manifest {
    book_id: String,
    title: String,
    author: String,
    language: String,
    total_duration_seconds: f64,
    created_at: DateTime<Utc>,
    schema_version: u32,
}

#[derive(Serialize)]
struct TocChapterEntry {
    chapter_id: String,
    toc_path: Vec<String>,
    segment_ids: Vec<String>,
    start_seconds: f64,
    duration_seconds: f64,
}

#[derive(Serialize)]
struct Toc {
    chapters: Vec<TocChapterEntry>,
}

fn segment_duration_seconds(segment: &Segment) -> f64 {
    segment
        .timestamps
        .as_ref()
        .and_then(|t| t.items.last())
        .map(|item| item.end_ms as f64 / 1000.0)
        .unwrap_or(0.0)
}

/// Resolve the audio file actually persisted for a segment (its extension
/// is only known once a TTS provider has chosen a format).
async fn find_segment_audio(storage: &dyn BlobStorage, book_id: &str, segment_id: &str) -> Option<(String, Vec<u8>)> {
    let prefix = format!("books/{book_id}/audio/{segment_id}.");
    let matches = storage.list(&prefix).await.ok()?;
    let path = matches.into_iter().next()?;
    let bytes = storage.get(&path).await.ok()?;
    let ext = path.rsplit('.').next().unwrap_or("bin").to_string();
    Some((ext, bytes))
}

/// Build the full bundle archive for a book and return the zip bytes.
pub async fn build_bundle(
    book: &Book,
    chapters: &[Chapter],
    segments: &[Segment],
    voice_map: &Option<VoiceMap>,
    storage: &dyn BlobStorage,
    shard_size: usize,
) -> Result<Vec<u8>> {
    let mut ordered_segments = segments.to_vec();
    ordered_segments.sort_by(|a, b| a.id.cmp(&b.id));

    let total_duration_seconds: f64 = ordered_segments.iter().map(segment_duration_seconds).sum();

    let manifest = Manifest {
        book_id: book.id.clone(),
        title: book.title.clone(),
        author: book.author.clone(),
        language: book.language.clone(),
        total_duration_seconds,
        created_at: book.created_at,
        schema_version: SCHEMA_VERSION,
    };

    let mut toc_chapters = Vec::with_capacity(chapters.len());
    let mut clock = 0.0_f64;
    for chapter in chapters {
        let chapter_segments: Vec<&Segment> = ordered_segments.iter().filter(|s| s.chapter_id == chapter.id).collect();
        let duration: f64 = chapter_segments.iter().map(|s| segment_duration_seconds(s)).sum();
        toc_chapters.push(TocChapterEntry {
            chapter_id: chapter.id.clone(),
            toc_path: chapter.toc_path.clone(),
            segment_ids: chapter_segments.iter().map(|s| s.id.clone()).collect(),
            start_seconds: clock,
            duration_seconds: duration,
        });
        clock += duration;
    }
    let toc = Toc { chapters: toc_chapters };

    let buffer = Vec::new();
    let cursor = std::io::Cursor::new(buffer);
    let mut zip = ZipWriter::new(cursor);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    write_json(&mut zip, &options, "manifest.json", &manifest)?;
    write_json(&mut zip, &options, "toc.json", &toc)?;
    write_json(&mut zip, &options, "voice-map.json", voice_map)?;

    for (index, segment) in ordered_segments.iter().enumerate() {
        let shard = index / shard_size.max(1);
        let shard_dir = format!("segments/{shard:03}");

        write_json(&mut zip, &options, &format!("{shard_dir}/{}.json", segment.id), segment)?;

        if let Some((ext, bytes)) = find_segment_audio(storage, &book.id, &segment.id).await {
            zip.start_file(format!("{shard_dir}/{}.{ext}", segment.id), options)
                .map_err(|e| Error::Storage(format!("zip write error: {e}")))?;
            zip.write_all(&bytes).map_err(|e| Error::Storage(format!("zip write error: {e}")))?;
        }
    }

    let cursor = zip.finish().map_err(|e| Error::Storage(format!("zip finalize error: {e}")))?;
    Ok(cursor.into_inner())
}

fn write_json<T: Serialize, W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    options: &SimpleFileOptions,
    name: &str,
    value: &T,
) -> Result<()> {
    zip.start_file(name, *options).map_err(|e| Error::Storage(format!("zip write error: {e}")))?;
    let json = serde_json::to_vec_pretty(value).map_err(|e| Error::Storage(format!("serialize error: {e}")))?;
    zip.write_all(&json).map_err(|e| Error::Storage(format!("zip write error: {e}")))?;
    Ok(())
}
