
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_chunk_chars: usize,
    /// Number of characters from the end of a chunk carried into the next one
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_chars: 1200,
            overlap_chars: 150,
        }
    }
}

/// Split text into overlapping fixed-size chunks ready for embedding.
///
/// Whitespace runs are collapsed to a single space and the result is
/// trimmed before windowing, so chunk boundaries are stable regardless of
/// the source document's line layout. Empty cleaned text yields no chunks.
/// Window arithmetic is in characters, never bytes, so a chunk boundary
/// cannot land inside a multi-byte code point.
///
/// Invariant (enforced by config validation, not here): `overlap_chars`
/// must be strictly less than `max_chunk_chars` or the window cannot
/// advance.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let cleaned = collapse_whitespace(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = cleaned.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = usize::min(chars.len(), start + config.max_chunk_chars);
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(config.overlap_chars);
    }

    debug!(
        "Chunked {} characters into {} chunks (max {}, overlap {})",
        chars.len(),
        chunks.len(),
        config.max_chunk_chars,
        config.overlap_chars
    );

    chunks
}

/// Collapse all whitespace runs to a single space and trim the ends
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
