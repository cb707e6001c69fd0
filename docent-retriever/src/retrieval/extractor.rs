//! Text extraction from document files.

use crate::error::{Result, RetrievalError};
use std::path::Path;

/// Turns a document's raw bytes into plain text for chunking.
pub trait DocumentExtractor: Send + Sync {
    /// Whether this extractor handles `path`. Unsupported files are ignored by ingestion.
    fn supports(&self, path: &Path) -> bool;

    /// Extract the text of the document at `path` from its contents.
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<String>;
}

/// Extensions read as plain text by default.
pub const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "rst"];

/// Reads UTF-8 text files, selected by extension (case-insensitive).
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    extensions: Vec<String>,
}

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self::with_extensions(PLAIN_TEXT_EXTENSIONS.iter().copied())
    }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|known| *known == ext))
    }

    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(bytes).map_err(|e| RetrievalError::Unextractable {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8: {e}"),
        })?;
        // A leading byte-order mark is not document text.
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_known_extensions() {
        let extractor = PlainTextExtractor::new();
        assert!(extractor.supports(Path::new("docs/guide.md")));
        assert!(extractor.supports(Path::new("NOTES.TXT")));
        assert!(extractor.supports(Path::new("a/b/c.rst")));
        assert!(!extractor.supports(Path::new("image.png")));
        assert!(!extractor.supports(Path::new("Makefile")));
    }

    #[test]
    fn test_custom_extensions() {
        let extractor = PlainTextExtractor::with_extensions([".LOG", "csv"]);
        assert_eq!(extractor.extensions(), &["log".to_string(), "csv".to_string()]);
        assert!(extractor.supports(Path::new("server.log")));
        assert!(!extractor.supports(Path::new("readme.md")));
    }

    #[test]
    fn test_extract_utf8() {
        let extractor = PlainTextExtractor::new();
        let text = extractor
            .extract(Path::new("a.md"), "\u{feff}# Title\nbody".as_bytes())
            .unwrap();
        assert_eq!(text, "# Title\nbody");
    }

    #[test]
    fn test_extract_rejects_binary() {
        let extractor = PlainTextExtractor::new();
        let err = extractor
            .extract(Path::new("a.txt"), &[0xff, 0xfe, 0x00, 0x80])
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Unextractable { .. }));
    }
}
