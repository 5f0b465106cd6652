//! Text chunking over word windows
//!
//! This module handles splitting documents into chunks while:
//! - Keeping chunk boundaries on whitespace-delimited words
//! - Overlapping consecutive windows so context survives a boundary
//! - Providing stable, deterministic chunk boundaries
//! - Computing content hashes for idempotent re-indexing

use crate::config::{default_chunk_overlap, default_chunk_size};
use crate::error::{Error, Result};
use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chunking configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Words per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Words shared between the end of one chunk and the start of the next
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Requires `chunk_size > overlap`; anything else would never advance.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Number of words between the starts of consecutive windows
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A text chunk with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Words of the window joined by single spaces
    pub text: String,

    /// Chunk index (0-based, contiguous within one document)
    pub index: usize,

    /// Offset of the first word of this chunk in the document
    pub word_start: usize,

    /// Character count of `text`
    pub size: usize,

    /// Number of words in the chunk
    pub word_count: usize,

    /// Blake3 hash of `text` (64 hex chars)
    pub content_hash: String,

    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// First `len` hex characters of the content hash
    pub fn hash_prefix(&self, len: usize) -> &str {
        let end = len.min(self.content_hash.len());
        &self.content_hash[..end]
    }
}

/// Chunk a document into overlapping word windows.
///
/// Windows of `chunk_size` words start every `chunk_size - overlap` words.
/// The last window is the first one that reaches the end of the text, so no
/// trailing chunk is wholly contained in its predecessor.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let created_at = Utc::now();
    let stride = config.stride();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        let window = &words[start..end];
        let joined = window.join(" ");

        if !joined.trim().is_empty() {
            chunks.push(Chunk {
                size: joined.chars().count(),
                word_count: window.len(),
                content_hash: compute_text_hash(&joined),
                text: joined,
                index: chunks.len(),
                word_start: start,
                created_at,
            });
        }

        if end >= words.len() {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Compute a stable hash for document content
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Compute a stable hash for a string
pub fn compute_text_hash(text: &str) -> String {
    compute_content_hash(text.as_bytes())
}
