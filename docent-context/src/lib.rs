pub mod text;

// Re-export the main chunking entry points for external use
pub use text::{TextChunk, TextChunker, normalize_whitespace, split};
