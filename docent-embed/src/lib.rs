//! # docent-embed
//!
//! Clients for the two remote model services a retrieval engine talks to:
//! an embedding service that turns text into vectors, and a generation
//! service that turns a conversation into an answer.
//!
//! ## Features
//!
//! - **Provider traits**: [`EmbeddingProvider`] and [`ChatProvider`] let
//!   callers swap the HTTP clients for in-process fakes in tests
//! - **Query cache**: [`CachedEmbedder`] memoizes question embeddings with an
//!   explicit, caller-chosen bound ([`CachePolicy`])
//! - **Classified failures**: every call returns a [`ModelError`] naming the
//!   endpoint and separating unreachable services from error replies and
//!   malformed payloads
//!
//! ## Quick Start
//!
//! ```no_run
//! use docent_embed::{CachePolicy, CachedEmbedder, EmbedConfig, HttpEmbeddingProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> docent_embed::Result<()> {
//! let provider = HttpEmbeddingProvider::new(&EmbedConfig::default())?;
//! let policy = CachePolicy::from_capacity(1024);
//! let embedder = CachedEmbedder::with_policy(Arc::new(provider), policy);
//!
//! let vector = embedder.embed_query("How do I rotate the logs?").await?;
//! println!("{} dimensions", vector.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: service addresses, model names and timeouts
//! - [`provider`]: the embedding trait and its HTTP implementation
//! - [`cache`]: query cache policies and the caching embedder
//! - [`chat`]: chat messages, prompt assembly and the generation client
//! - [`error`]: error types and result handling

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
mod http;
pub mod provider;

// Re-export main types for easy access
pub use cache::{CachePolicy, CachedEmbedder, LruQueryCache, QueryCache, UnboundedCache};
pub use chat::{ChatMessage, ChatProvider, Exchange, HttpChatProvider, Role, build_messages};
pub use config::{ChatConfig, EmbedConfig};
pub use error::{ModelError, Result};
pub use provider::{EmbeddingProvider, HttpEmbeddingProvider};
