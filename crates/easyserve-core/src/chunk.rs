//! Paragraph-boundary text chunker with optional overlap.
//!
//! Splits extracted document text into bounded segments suitable for
//! embedding. The policy:
//!
//! - Lengths are counted in `char`s, never bytes, so multi-byte text is
//!   never split inside a code point.
//! - No emitted segment is longer than `max_chars`.
//! - Paragraphs (runs of non-blank lines) are packed greedily into a body of
//!   at most `max_chars - overlap_chars`. A paragraph longer than that is
//!   hard-split at the last whitespace before the limit, or at the limit.
//! - Every segment after the first is prefixed with the tail of its
//!   predecessor body (snapped forward to a word boundary) so that a sentence
//!   straddling a boundary is still retrievable from either side.
//! - Empty or whitespace-only input yields no segments.
//!
//! Output is a pure function of the input and the two limits: the chunk
//! index is part of the embedding-record id, so re-running on the same text
//! must reproduce the same segments in the same order.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{Chunk, DocumentId, TenantId};

pub const DEFAULT_MAX_CHARS: usize = 1000;
pub const DEFAULT_OVERLAP_CHARS: usize = 100;

/// Deterministic text splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl Chunker {
    /// Requires `max_chars > 0` and `overlap_chars < max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(Error::InvalidInput("max_chars must be > 0".into()));
        }
        if overlap_chars >= max_chars {
            return Err(Error::InvalidInput(format!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                overlap_chars, max_chars
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    /// Split text into ordered segments.
    pub fn split(&self, text: &str) -> Vec<String> {
        let bodies = pack_paragraphs(text, self.max_chars - self.overlap_chars);
        if self.overlap_chars == 0 {
            return bodies;
        }

        let mut segments = Vec::with_capacity(bodies.len());
        for (i, body) in bodies.iter().enumerate() {
            if i == 0 {
                segments.push(body.clone());
                continue;
            }
            // One char of the overlap budget goes to the joining space.
            let tail = overlap_tail(&bodies[i - 1], self.overlap_chars - 1);
            if tail.is_empty() {
                segments.push(body.clone());
            } else {
                segments.push(format!("{} {}", tail, body));
            }
        }
        segments
    }

    /// Split text into [`Chunk`]s with dense indices starting at 0.
    pub fn chunk(&self, document_id: DocumentId, tenant_id: TenantId, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                document_id,
                tenant_id,
                chunk_index,
                text,
            })
            .collect()
    }
}

/// SHA-256 of the text, lowercase hex.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Group runs of non-blank lines into trimmed paragraphs.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n").trim().to_string());
    }
    out.retain(|p| !p.is_empty());
    out
}

fn pack_paragraphs(text: &str, limit: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in paragraphs(text) {
        let para_len = para.chars().count();

        if para_len > limit {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_len = 0;
            }
            segments.extend(hard_split(&para, limit));
            continue;
        }

        // +2 for the "\n\n" separator
        let would_be = if current.is_empty() {
            para_len
        } else {
            current_len + 2 + para_len
        };
        if would_be > limit && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(&para);
        current_len += para_len;
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Split one oversized paragraph into pieces of at most `limit` chars.
fn hard_split(text: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let limit_byte = match rest.char_indices().nth(limit) {
            Some((byte, _)) => byte,
            None => {
                pieces.push(rest.to_string());
                break;
            }
        };
        let window = &rest[..limit_byte];
        let split_at = window
            .rfind(char::is_whitespace)
            .filter(|&pos| pos > 0)
            .unwrap_or(limit_byte);

        let piece = rest[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        rest = rest[split_at..].trim_start();
    }
    pieces
}

/// Last `max` chars of `text`, dropping a leading partial word.
fn overlap_tail(text: &str, max: usize) -> &str {
    if max == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= max {
        return text.trim();
    }
    let start = text
        .char_indices()
        .nth(total - max)
        .map(|(byte, _)| byte)
        .unwrap_or(0);
    let tail = &text[start..];
    let cut_mid_word = text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace());
    let tail = if cut_mid_word {
        match tail.find(char::is_whitespace) {
            Some(pos) => &tail[pos..],
            None => "",
        }
    } else {
        tail
    };
    tail.trim()
}
