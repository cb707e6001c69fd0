//! Batch ingestion: documents on disk to a saved index.
//!
//! ## Pipeline Flow
//!
//! ```text
//! walk root → read → extract → chunk → embed (bounded, index-tagged) → IndexBuilder → IndexStore
//! ```
//!
//! Files are visited in sorted path order and their records appended in
//! chunk order, so the same corpus and the same embedding model always
//! produce the same index apart from its timestamp.
//!
//! ## Failure handling
//!
//! - A file that cannot be read or extracted is logged and skipped.
//! - Any embedding failure aborts the run. Nothing is written.
//! - A run that produces no records fails with
//!   [`RetrievalError::EmptyCorpus`] and leaves any existing index untouched.

use crate::error::{Result, RetrievalError};
use crate::retrieval::extractor::{DocumentExtractor, PlainTextExtractor};
use crate::retrieval::record_builder::IndexBuilder;
use crate::storage::IndexStore;
use docent_context::text::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, split};
use docent_embed::EmbeddingProvider;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the document tree
    pub root: PathBuf,
    /// Chunk window length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Embedding requests in flight at once
    pub concurrency: usize,
}

impl IngestConfig {
    /// Defaults: 1000-character chunks, 200 overlap, 4 concurrent embedding requests.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            concurrency: 4,
        }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Summary of a completed ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Supported files found under the root
    pub files_seen: usize,
    /// Files that contributed at least one record
    pub files_indexed: usize,
    /// Files skipped as unreadable, unextractable or empty
    pub files_skipped: usize,
    pub records: usize,
    pub dimension: usize,
    pub embedding_model: String,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Drives ingestion from a document tree into an [`IndexStore`].
pub struct IndexingEngine {
    config: IngestConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn IndexStore>,
    extractor: Arc<dyn DocumentExtractor>,
}

impl std::fmt::Debug for IndexingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingEngine")
            .field("config", &self.config)
            .field("embedding_model", &self.embedder.model_name())
            .finish()
    }
}

impl IndexingEngine {
    /// Engine reading plain-text documents.
    pub fn new(
        config: IngestConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IndexStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            extractor: Arc::new(PlainTextExtractor::new()),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Rebuild the index from every supported document under the root and save it.
    pub async fn ingest(&self) -> Result<IngestReport> {
        let start_time = Instant::now();
        let root = &self.config.root;
        info!(
            "Starting ingestion of {} with model {}",
            root.display(),
            self.embedder.model_name()
        );

        let files = self.discover_files()?;
        let mut builder = IndexBuilder::new(self.embedder.model_name(), root);
        let mut files_indexed = 0;
        let mut files_skipped = 0;

        for path in &files {
            let source = source_id(root, path);
            let Some(text) = self.read_document(path).await else {
                files_skipped += 1;
                continue;
            };

            let chunks = split(&text, self.config.chunk_size, self.config.chunk_overlap);
            if chunks.is_empty() {
                debug!("Skipping {}: no text", source);
                files_skipped += 1;
                continue;
            }

            let embeddings = self.embed_chunks(&source, &chunks).await?;
            let added = builder.add_source(&source, chunks, embeddings)?;
            debug!("Indexed {} ({} chunks)", source, added);
            files_indexed += 1;
        }

        let index = builder.finish()?;
        self.store.save(&index).await?;

        let report = IngestReport {
            files_seen: files.len(),
            files_indexed,
            files_skipped,
            records: index.len(),
            dimension: index.dimension,
            embedding_model: index.embedding_model,
            elapsed: start_time.elapsed(),
        };
        info!(
            "Ingestion complete: {} records from {} of {} files ({} skipped) in {:?}",
            report.records,
            report.files_indexed,
            report.files_seen,
            report.files_skipped,
            report.elapsed
        );
        Ok(report)
    }

    /// Supported files under the root, sorted. Hidden entries are not visited;
    /// ignore files such as `.gitignore` are not consulted.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(RetrievalError::io(
                root,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "document root is not a directory",
                ),
            ));
        }

        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(root)
            .hidden(true)
            .parents(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file && self.extractor.supports(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        debug!("Found {} supported files under {}", files.len(), root.display());
        Ok(files)
    }

    async fn read_document(&self, path: &Path) -> Option<String> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };
        match self.extractor.extract(path, &bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Skipping {}", e);
                None
            }
        }
    }

    /// Embed `chunks` concurrently, returning vectors in chunk order.
    async fn embed_chunks(&self, source: &str, chunks: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedder = &self.embedder;
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];

        let mut completed = stream::iter(chunks.iter().enumerate())
            .map(|(position, chunk)| async move {
                embedder
                    .embed_text(chunk)
                    .await
                    .map(|embedding| (position, embedding))
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .map_err(RetrievalError::from);

        while let Some((position, embedding)) = completed.try_next().await? {
            slots[position] = Some(embedding);
        }

        let embeddings: Vec<Vec<f32>> = slots.into_iter().flatten().collect();
        if embeddings.len() != chunks.len() {
            return Err(RetrievalError::MisalignedEmbeddings {
                document: source.to_string(),
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        Ok(embeddings)
    }
}

/// `path` relative to `root`, joined with `/` on every platform.
pub fn source_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
