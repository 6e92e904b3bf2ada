//! Recursive boundary-seeking text chunker.
//!
//! Splits extracted document text into pieces of at most `size` characters,
//! with up to `overlap` characters of shared context between neighbours.
//!
//! # Algorithm
//!
//! 1. Pick the highest-priority separator present in the text, in order:
//!    paragraph break (`\n\n`), line break (`\n`), sentence end (`. `, `! `,
//!    `? `), space, and finally individual characters.
//! 2. Split on it, keeping each separator attached to the piece it ends.
//!    Pieces still longer than `size` are split again with the remaining,
//!    lower-priority separators. The result is one flat sequence of pieces,
//!    each at most `size` characters, that concatenates back to the text.
//! 3. The pieces are merged greedily into windows of at most `size`
//!    characters. When a window is flushed, its last `overlap` characters
//!    (whole pieces where possible, otherwise a word-aligned tail of one)
//!    seed the next window, so neighbours share context across paragraph
//!    and sentence boundaries alike.
//!
//! Lengths are counted in Unicode scalar values, never bytes, so a cut
//! never lands inside a multi-byte character. Output is deterministic for a
//! given `(text, size, overlap)`.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::split_text;
//!
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", 1000, 200);
//! assert_eq!(pieces, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};

use crate::models::{chunk_id, Chunk};

/// Separators in priority order. The empty separator means "cut anywhere".
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];

/// Chunk size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 200,
        }
    }
}

/// Split `text` into ordered, overlapping pieces of at most `size` characters.
///
/// Returns no pieces for empty (or whitespace-only) input and exactly one
/// piece for text that already fits. `overlap` is clamped below `size`.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let overlap = overlap.min(size - 1);

    let mut out = Vec::new();
    if text.is_empty() {
        return out;
    }
    let mut pieces = Vec::new();
    collect_pieces(text, SEPARATORS, size, &mut pieces);
    merge_pieces(&pieces, size, overlap, &mut out);
    out
}

/// Split a document's text and assign ids, indices, and content hashes.
///
/// Indices are contiguous from 0 and ids follow `{doc_id}_chunk_{index}`.
pub fn chunk_document(doc_id: &str, text: &str, params: ChunkParams) -> Vec<Chunk> {
    split_text(text, params.size, params.overlap)
        .into_iter()
        .enumerate()
        .map(|(index, piece)| make_chunk(doc_id, index, piece))
        .collect()
}

fn make_chunk(doc_id: &str, index: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(doc_id, index),
        doc_id: doc_id.to_string(),
        chunk_index: index,
        text,
        hash,
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Decompose `text` into pieces of at most `size` characters, in order.
fn collect_pieces<'a>(text: &'a str, separators: &[&str], size: usize, out: &mut Vec<&'a str>) {
    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let lower = separators.get(position + 1..).unwrap_or(&[]);

    if separator.is_empty() {
        out.extend(text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]));
        return;
    }
    for piece in text.split_inclusive(separator) {
        if char_len(piece) <= size {
            out.push(piece);
        } else {
            collect_pieces(piece, lower, size, out);
        }
    }
}

/// Greedily pack consecutive pieces into windows, carrying overlap forward.
fn merge_pieces(pieces: &[&str], size: usize, overlap: usize, out: &mut Vec<String>) {
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > size && !window.is_empty() {
            flush(&window, out);
            let budget = overlap.min(size - len);
            while total > budget {
                let Some((dropped, dropped_len)) = window.pop_front() else {
                    break;
                };
                total -= dropped_len;
                if total < budget {
                    let carried = word_tail(dropped, budget - total);
                    if !carried.is_empty() {
                        let carried_len = char_len(carried);
                        window.push_front((carried, carried_len));
                        total += carried_len;
                    }
                    break;
                }
            }
        }
        window.push_back((piece, len));
        total += len;
    }
    flush(&window, out);
}

/// Suffix of `piece` at most `want` characters long, starting on a word
/// boundary when the suffix contains whitespace.
fn word_tail(piece: &str, want: usize) -> &str {
    if want == 0 {
        return "";
    }
    let skip = char_len(piece).saturating_sub(want);
    let start = piece
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(piece.len());
    let suffix = &piece[start..];
    let at_word_start = piece[..start]
        .chars()
        .next_back()
        .map_or(true, char::is_whitespace);
    if at_word_start {
        return suffix;
    }
    match suffix.find(char::is_whitespace) {
        Some(ws) => suffix[ws..].trim_start(),
        None => suffix,
    }
}

fn flush(window: &VecDeque<(&str, usize)>, out: &mut Vec<String>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
