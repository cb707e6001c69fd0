//! Settings for ingestion and retrieval, loaded from an optional TOML file.
//!
//! Every field has a default, so an empty file (or no file) is a working
//! configuration for a model server on the local machine:
//!
//! ```toml
//! documents = "docs"
//! index = "data/index.json"
//! chunk_size = 1000
//! chunk_overlap = 200
//! top_k = 4
//! embed_concurrency = 4
//! query_cache_capacity = 1024   # 0 keeps every query
//!
//! [embed]
//! base_url = "http://localhost:11434"
//! model = "nomic-embed-text"
//!
//! [chat]
//! model = "llama3"
//! ```

use crate::error::{Result, RetrievalError};
use crate::retrieval::ranker::DEFAULT_TOP_K;
use docent_context::text::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use docent_embed::{CachePolicy, ChatConfig, EmbedConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File read when no configuration path is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "docent.toml";

/// Instruction given to the generation model ahead of the conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You answer questions using only the provided context. \
If the context does not contain the answer, say that you do not know.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocentConfig {
    /// Root of the document tree to ingest
    pub documents: PathBuf,
    /// Location of the index artifact
    pub index: PathBuf,
    /// Chunk window length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Fragments retrieved per question
    pub top_k: usize,
    /// Chunk embedding requests in flight at once during ingestion
    pub embed_concurrency: usize,
    /// Query embeddings remembered; `0` means no bound
    pub query_cache_capacity: usize,
    pub system_prompt: String,
    pub embed: EmbedConfig,
    pub chat: ChatConfig,
}

impl Default for DocentConfig {
    fn default() -> Self {
        Self {
            documents: PathBuf::from("docs"),
            index: PathBuf::from("data/index.json"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embed_concurrency: 4,
            query_cache_capacity: 1024,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            embed: EmbedConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl DocentConfig {
    /// Parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RetrievalError::io(path, e))?;
        Self::from_toml(&raw).map_err(|reason| RetrievalError::InvalidConfig {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Read `path` if given, otherwise [`DEFAULT_CONFIG_FILE`] when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_toml(raw: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(raw).map_err(|e| e.to_string())?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be at least 1".to_string());
        }
        if self.embed_concurrency == 0 {
            return Err("embed_concurrency must be at least 1".to_string());
        }
        self.embed.validate().map_err(|e| e.to_string())?;
        self.chat.validate().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Validate settings after command-line overrides have been applied.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(|reason| RetrievalError::InvalidConfig {
            path: PathBuf::from("<command line>"),
            reason,
        })
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::from_capacity(self.query_cache_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = DocentConfig::default();
        assert_eq!(config.documents, PathBuf::from("docs"));
        assert_eq!(config.index, PathBuf::from("data/index.json"));
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.embed.model, "nomic-embed-text");
        assert_eq!(config.chat.model, "llama3");
        assert_eq!(config.embed.base_url, "http://localhost:11434");
        assert!(matches!(config.cache_policy(), CachePolicy::Lru(cap) if cap.get() == 1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(DocentConfig::from_toml("").unwrap(), DocentConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docent.toml");
        std::fs::write(
            &path,
            r#"
documents = "handbook"
chunk_size = 400
query_cache_capacity = 0

[embed]
model = "mxbai-embed-large"
"#,
        )
        .unwrap();

        let config = DocentConfig::load(Some(&path)).unwrap();
        assert_eq!(config.documents, PathBuf::from("handbook"));
        assert_eq!(config.chunk_size, 400);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.embed.model, "mxbai-embed-large");
        assert_eq!(config.embed.base_url, "http://localhost:11434");
        assert_eq!(config.cache_policy(), CachePolicy::Unbounded);
    }

    #[test]
    fn test_invalid_files() {
        let unknown = DocentConfig::from_toml("chunk_sise = 10");
        assert!(unknown.unwrap_err().contains("chunk_sise"));

        let zero_k = DocentConfig::from_toml("top_k = 0");
        assert!(zero_k.is_err());

        let bad_url = DocentConfig::from_toml("[chat]\nbase_url = \"localhost\"");
        assert!(bad_url.is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = DocentConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, RetrievalError::Io { .. }));
    }
}
