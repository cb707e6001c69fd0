//! docent-retriever: question answering over a local document folder
//!
//! This crate builds a vector index from a tree of text documents and answers
//! questions from it. Ingestion chunks every document, embeds each chunk with
//! a remote embedding model and saves the records as one JSON file. Retrieval
//! embeds the question, ranks every record by cosine similarity and hands the
//! best fragments to a generation model as context.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: ingestion engine, record builder, ranker and retrieval orchestrator
//! - **[`storage`]**: index data model and the JSON index store
//! - **[`config`]**: TOML configuration with defaults for a local model server
//! - **[`error`]**: the [`RetrievalError`] taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docent_embed::{CachePolicy, CachedEmbedder, ChatConfig, EmbedConfig};
//! use docent_embed::{HttpChatProvider, HttpEmbeddingProvider};
//! use docent_retriever::retrieval::indexing_engine::{IndexingEngine, IngestConfig};
//! use docent_retriever::retrieval::orchestrator::Retriever;
//! use docent_retriever::storage::json_store::JsonIndexStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let embedder = Arc::new(HttpEmbeddingProvider::new(&EmbedConfig::default())?);
//! let store = Arc::new(JsonIndexStore::new("data/index.json"));
//!
//! IndexingEngine::new(IngestConfig::new("docs"), embedder.clone(), store.clone())
//!     .ingest()
//!     .await?;
//!
//! let retriever = Retriever::new(
//!     CachedEmbedder::with_policy(embedder, CachePolicy::from_capacity(1024)),
//!     store,
//!     Arc::new(HttpChatProvider::new(&ChatConfig::default())?),
//! );
//! let answer = retriever.answer("How do I rotate the logs?", &[]).await?;
//! println!("{}", answer.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! docs/ → Extractor → Chunker → EmbeddingProvider → IndexBuilder → JsonIndexStore
//!                                                                      ↓
//! question → CachedEmbedder → SimilarityRanker ← Index ←───────────────┘
//!                                   ↓
//!                         context → ChatProvider → answer
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{Result, RetrievalError};
