//! Turns chunk texts and their embeddings into index records.

use crate::error::{Result, RetrievalError};
use crate::storage::{Index, IndexRecord, RecordMetadata};
use chrono::Utc;
use std::path::PathBuf;

/// Stable identifier for chunk `chunk` of `source`: hex BLAKE3 of `"{source}:{chunk}"`.
///
/// The same document and position always produce the same id across rebuilds.
pub fn record_id(source: &str, chunk: usize) -> String {
    let digest = blake3::hash(format!("{source}:{chunk}").as_bytes());
    hex::encode(digest.as_bytes())
}

fn embedding_problem(embedding: &[f32], expected: usize) -> Option<String> {
    if embedding.is_empty() {
        return Some("embedding is empty".to_string());
    }
    if embedding.len() != expected {
        return Some(format!(
            "embedding has {} dimensions, expected {}",
            embedding.len(),
            expected
        ));
    }
    embedding
        .iter()
        .position(|value| !value.is_finite())
        .map(|position| format!("component {position} is not finite"))
}

/// Accumulates records for one ingestion run.
#[derive(Debug)]
pub struct IndexBuilder {
    embedding_model: String,
    root: PathBuf,
    records: Vec<IndexRecord>,
}

impl IndexBuilder {
    /// `root` only names the corpus in an [`RetrievalError::EmptyCorpus`] error.
    pub fn new(embedding_model: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            root: root.into(),
            records: Vec::new(),
        }
    }

    /// Append one record per chunk of `source`, pairing `chunks[i]` with `embeddings[i]`.
    ///
    /// Every embedding must be finite and as long as the first one the builder
    /// accepted. On error nothing from `source` is added. Returns the number of
    /// records added.
    pub fn add_source(
        &mut self,
        source: &str,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(RetrievalError::MisalignedEmbeddings {
                document: source.to_string(),
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let mut dimension = self.dimension();
        for (chunk, embedding) in embeddings.iter().enumerate() {
            let expected = *dimension.get_or_insert(embedding.len());
            if let Some(reason) = embedding_problem(embedding, expected) {
                return Err(RetrievalError::InvalidEmbedding {
                    document: source.to_string(),
                    chunk,
                    reason,
                });
            }
        }

        let added = chunks.len();
        self.records.extend(
            chunks
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(chunk, (text, embedding))| IndexRecord {
                    id: record_id(source, chunk),
                    embedding,
                    metadata: RecordMetadata {
                        text,
                        source: source.to_string(),
                        chunk,
                    },
                }),
        );
        Ok(added)
    }

    /// Length shared by every accepted embedding, once one has been added.
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|record| record.embedding.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Produce the finished index, stamped with the current time.
    pub fn finish(self) -> Result<Index> {
        let Some(first) = self.records.first() else {
            return Err(RetrievalError::EmptyCorpus { root: self.root });
        };

        Ok(Index {
            embedding_model: self.embedding_model,
            dimension: first.embedding.len(),
            created_at: Utc::now(),
            items: self.records,
        })
    }
}
