//! This module turns extracted document text into the fragments that get
//! embedded and stored in the retrieval index.
//!
//! Chunking is a plain sliding window: the text is first normalized (every run
//! of whitespace becomes a single space and the ends are trimmed), then a
//! fixed-size window slides across it. Consecutive windows overlap so that a
//! sentence cut at one boundary still appears whole in a neighbouring
//! fragment.
//!
//! The module defines:
//! - [`split`]: the plain function form, returning fragment strings.
//! - [`TextChunker`]: holds the window parameters and produces [`TextChunk`]s
//!   tagged with the source they came from and their position in it.
//!
//! # Window arithmetic
//!
//! Sizes are measured in characters (Unicode scalar values), never bytes.
//! With `chunk_size = 5` and `chunk_overlap = 2` the window advances by 3:
//!
//! ```text
//! a b c d e f g h
//! [a b c]
//!    [ c d ]
//!       [d e f]
//!          [ f g ]
//!             [g h]
//! ```
//!
//! The overlap is clamped to `chunk_size - 1`, so the window always moves
//! forward, and the scan stops as soon as a window touches the end of the
//! text. Removing the overlapping prefix from every fragment but the first
//! and concatenating reconstructs the normalized text exactly.
//!
//! # Usage
//!
//! ```
//! use docent_context::text::TextChunker;
//!
//! let chunker = TextChunker::new(5, 2);
//! let chunks = chunker.get_chunks("notes/alphabet.txt", "a b  c\nd e f g h");
//!
//! assert_eq!(chunks.len(), 5);
//! assert_eq!(chunks[0].text, "a b c");
//! assert_eq!(chunks[4].text, "g h");
//! assert_eq!(chunks[4].sequence, 4);
//! assert_eq!(chunks[4].source, "notes/alphabet.txt");
//! ```
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::OnceLock;

/// Default window length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

fn whitespace_run() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Collapses every whitespace run to a single space and trims both ends.
///
/// ```
/// use docent_context::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  one\n\ttwo   three \r\n"), "one two three");
/// assert_eq!(normalize_whitespace(" \n\t "), "");
/// ```
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text, " ").trim().to_string()
}

/// Splits `text` into overlapping fragments of at most `chunk_size` characters.
///
/// The text is normalized with [`normalize_whitespace`] first; an input that
/// is empty after normalization yields no fragments. `chunk_overlap` is
/// clamped to `chunk_size - 1` and a `chunk_size` of zero behaves as one.
///
/// ```
/// use docent_context::split;
///
/// let fragments = split("a b c d e f g h", 5, 2);
/// assert_eq!(fragments, vec!["a b c", " c d ", "d e f", " f g ", "g h"]);
///
/// // A window wider than the text produces the whole text once.
/// assert_eq!(split("short text", 100, 10), vec!["short text"]);
/// ```
pub fn split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    window_ranges(&normalized, chunk_size, chunk_overlap)
        .into_iter()
        .map(|range| normalized[range].to_string())
        .collect()
}

// Byte ranges of every window over already-normalized text. Window positions
// are computed in characters and mapped back to byte offsets so that slicing
// never lands inside a multi-byte character.
fn window_ranges(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let overlap = chunk_overlap.min(chunk_size - 1);
    let step = chunk_size - overlap;

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut ranges = Vec::with_capacity(char_count.div_ceil(step));
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        ranges.push(boundaries[start]..boundaries[end]);
        if end == char_count {
            break;
        }
        start += step;
    }
    ranges
}

/// A single fragment of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Identifier of the originating document, usually its relative path.
    pub source: String,
    /// Zero-based position of this fragment within its source.
    pub sequence: usize,
    /// The fragment text.
    pub text: String,
}

/// Holds the window parameters used to chunk documents.
///
/// A chunker is cheap to copy and carries no per-document state, so one
/// instance is shared across a whole ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextChunker {
    /// Creates a chunker. Parameters are stored as given and clamped when used.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance in characters between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        let chunk_size = self.chunk_size.max(1);
        chunk_size - self.chunk_overlap.min(chunk_size - 1)
    }

    /// Splits `content` into fragments tagged with `source` and their sequence number.
    pub fn get_chunks(&self, source: &str, content: &str) -> Vec<TextChunk> {
        split(content, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(sequence, text)| TextChunk {
                source: source.to_string(),
                sequence,
                text,
            })
            .collect()
    }
}
