//! Error types for ingestion and retrieval

use docent_embed::ModelError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Everything that can go wrong while building or querying an index.
///
/// Model service failures pass through unchanged as [`RetrievalError::Model`],
/// so callers can still tell an unreachable service from a bad reply.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// No index artifact exists yet. Run ingestion first.
    #[error("No index found at {}; run `docent ingest` to build one", path.display())]
    IndexNotFound { path: PathBuf },

    #[error("Index at {} is corrupt: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// Ingestion produced zero records, so there is nothing to save.
    #[error("No indexable text found under {}", root.display())]
    EmptyCorpus { root: PathBuf },

    /// A document could not be turned into text. Ingestion skips it.
    #[error("Cannot extract text from {}: {reason}", path.display())]
    Unextractable { path: PathBuf, reason: String },

    /// A document's chunk and embedding counts disagree.
    #[error("{document}: {chunks} chunks but {embeddings} embeddings")]
    MisalignedEmbeddings {
        document: String,
        chunks: usize,
        embeddings: usize,
    },

    /// An embedding cannot join the index: wrong length or a non-finite component.
    #[error("{document} chunk {chunk}: {reason}")]
    InvalidEmbedding {
        document: String,
        chunk: usize,
        reason: String,
    },

    #[error("Invalid configuration in {}: {reason}", path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("I/O error on {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl RetrievalError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
