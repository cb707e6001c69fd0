//! Persistent index model and storage abstraction
//!
//! An [`Index`] is built wholesale by one ingestion run and read in full by
//! every retrieval request. The [`IndexStore`] trait separates that lifecycle
//! from where the bytes live; [`json_store::JsonIndexStore`] keeps the whole
//! index in a single human-inspectable JSON document.
//!
//! ## Serialized shape
//!
//! ```text
//! {
//!   "embeddingModel": "nomic-embed-text",
//!   "dimension": 768,
//!   "createdAt": "2026-01-01T00:00:00Z",
//!   "items": [
//!     { "id": "<blake3 hex>", "embedding": [..],
//!       "metadata": { "text": "..", "source": "guide/intro.md", "chunk": 0 } }
//!   ]
//! }
//! ```

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod json_store;

/// Where a record's text came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// The chunk text itself
    pub text: String,
    /// Document identifier, a `/`-separated path relative to the document root
    pub source: String,
    /// Zero-based position of the chunk within its document
    pub chunk: usize,
}

/// One embedded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A complete retrieval index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Model the record embeddings were produced with. Provenance only.
    pub embedding_model: String,
    /// Length shared by every record embedding
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    /// Records in ingestion order
    pub items: Vec<IndexRecord>,
}

impl Index {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct sources in the order they first appear.
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.items
            .iter()
            .map(|item| item.metadata.source.as_str())
            .filter(|source| seen.insert(*source))
            .collect()
    }

    /// Describe the first record holding a NaN or infinite component.
    pub fn non_finite_embedding(&self) -> Option<String> {
        self.items.iter().enumerate().find_map(|(position, item)| {
            item.embedding
                .iter()
                .position(|value| !value.is_finite())
                .map(|component| {
                    format!(
                        "record {} ({}) has a non-finite component at {}",
                        position, item.id, component
                    )
                })
        })
    }

    /// Describe the first record whose embedding length is not `dimension`.
    pub fn dimension_mismatch(&self) -> Option<String> {
        self.items
            .iter()
            .position(|item| item.embedding.len() != self.dimension)
            .map(|position| {
                format!(
                    "record {} ({}) has {} dimensions, index declares {}",
                    position,
                    self.items[position].id,
                    self.items[position].embedding.len(),
                    self.dimension
                )
            })
    }
}

/// Load and save a whole index.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Replace any stored index with `index`. Readers never observe a partial write.
    async fn save(&self, index: &Index) -> Result<()>;

    /// Read the stored index, validating that every embedding has the declared dimension.
    async fn load(&self) -> Result<Index>;

    /// Whether an index has been saved.
    async fn exists(&self) -> bool;
}
