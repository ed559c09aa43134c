
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Segment, SegmentMetadata};

/// Split page text into overlapping windows sized for the embedding provider.
///
/// Token budgets are converted to character budgets with a fixed ratio since
/// no tokenizer is assumed available. Text at or under the chunk budget comes
/// back as a single chunk; otherwise each window after the first starts at
/// `previous_end - overlap` and the final window runs to the end of the text.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chunk_chars = (config.chunk_size * config.chars_per_token).max(1);
    // Config validation rejects overlap >= chunk size, but a hand-built
    // config can bypass it; clamp so the window stride stays positive.
    let overlap_chars = (config.overlap_size * config.chars_per_token).min(chunk_chars - 1);

    // Operate on chars, not bytes, so windows never split a code point.
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= chunk_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = start + chunk_chars;

        if end >= chars.len() {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        chunks.push(chars[start..end].iter().collect());
        start = end - overlap_chars;
    }

    debug!("Text chunked into {} segments", chunks.len());
    chunks
}

/// Deterministic segment identifier over `(source_url, chunk_index)`.
///
/// UUIDv5 keeps re-ingestion of the same page idempotent: the vector store
/// sees the same key and overwrites instead of duplicating.
#[inline]
pub fn segment_id(source_url: &str, chunk_index: usize) -> Uuid {
    let name = format!("{source_url}_{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

/// Chunk a page and assemble storage-ready segments with stable ids.
#[inline]
pub fn segment_page(
    text: &str,
    source_url: &str,
    title: &str,
    config: &ChunkingConfig,
) -> Vec<Segment> {
    let created_at = Utc::now().to_rfc3339();

    chunk_text(text, config)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| Segment {
            id: segment_id(source_url, chunk_index),
            content,
            source_url: source_url.to_string(),
            metadata: SegmentMetadata {
                title: title.to_string(),
                created_at: created_at.clone(),
            },
            chunk_index,
            embedding: None,
        })
        .collect()
}
