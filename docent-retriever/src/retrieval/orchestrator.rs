//! Question answering over a saved index.
//!
//! Each request embeds the question through the query cache, reads the whole
//! index from the store, ranks every record and joins the best fragments into
//! a context block. [`Retriever::answer`] then hands that context, with the
//! conversation so far, to the generation model.
//!
//! Nothing here is mutable between requests except the query cache, so one
//! [`Retriever`] can serve concurrent questions.

use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::error::Result;
use crate::retrieval::ranker::{DEFAULT_TOP_K, LinearScanRanker, SimilarityRanker};
use crate::storage::IndexStore;
use docent_embed::{CachedEmbedder, ChatProvider, Exchange, build_messages};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Separator placed between fragments in a context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// A retrieved chunk with its similarity to the question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    pub id: String,
    pub source: String,
    pub chunk: usize,
    pub score: f32,
    pub text: String,
}

/// Ranked fragments and the context block built from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    /// Best first
    pub fragments: Vec<Fragment>,
    /// Fragment texts in ranked order, separated by a blank line
    pub context: String,
}

/// A generated answer and the fragments it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Fragment>,
}

/// Retrieval pipeline over one index.
#[derive(Clone)]
pub struct Retriever {
    embedder: CachedEmbedder,
    store: Arc<dyn IndexStore>,
    chat: Arc<dyn ChatProvider>,
    ranker: Arc<dyn SimilarityRanker>,
    top_k: usize,
    system_prompt: String,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder)
            .field("chat_model", &self.chat.model_name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl Retriever {
    /// Retriever using a linear-scan ranker, the default top-k and system prompt.
    pub fn new(
        embedder: CachedEmbedder,
        store: Arc<dyn IndexStore>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            ranker: Arc::new(LinearScanRanker),
            top_k: DEFAULT_TOP_K,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn SimilarityRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn embedder(&self) -> &CachedEmbedder {
        &self.embedder
    }

    /// Find the fragments most similar to `question` and join them into a context block.
    ///
    /// Fails with `IndexNotFound` before any ranking when no index has been
    /// built, and passes embedding service failures through unchanged.
    pub async fn answer_context(&self, question: &str) -> Result<RetrievedContext> {
        let query = self.embedder.embed_query(question).await?;
        let index = self.store.load().await?;

        if index.embedding_model != self.embedder.model_name() {
            warn!(
                "Index was built with embedding model '{}' but queries use '{}'; results may be meaningless",
                index.embedding_model,
                self.embedder.model_name()
            );
        }

        let fragments: Vec<Fragment> = self
            .ranker
            .rank(&index, &query, self.top_k)
            .into_iter()
            .map(|ranked| Fragment {
                id: ranked.record.id.clone(),
                source: ranked.record.metadata.source.clone(),
                chunk: ranked.record.metadata.chunk,
                score: ranked.score,
                text: ranked.record.metadata.text.clone(),
            })
            .collect();

        let context = fragments
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        debug!(
            "Retrieved {} of {} records for question",
            fragments.len(),
            index.len()
        );
        Ok(RetrievedContext { fragments, context })
    }

    /// Answer `question` from retrieved context, continuing the conversation in `history`.
    pub async fn answer(&self, question: &str, history: &[Exchange]) -> Result<Answer> {
        let retrieved = self.answer_context(question).await?;
        let messages = build_messages(
            Some(self.system_prompt.as_str()),
            history,
            user_turn(&retrieved.context, question),
        );

        let answer = self.chat.complete(&messages).await?;
        Ok(Answer {
            answer,
            sources: retrieved.fragments,
        })
    }
}

/// Final user message: the context block followed by the question.
pub fn user_turn(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetrievalError;
    use crate::retrieval::record_builder::IndexBuilder;
    use crate::storage::json_store::JsonIndexStore;
    use async_trait::async_trait;
    use docent_embed::{CachePolicy, ChatMessage, EmbeddingProvider, ModelError, Role};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    /// Returns fixed vectors per question and counts calls.
    struct TableEmbedder {
        model: String,
        table: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for TableEmbedder {
        async fn embed_text(&self, text: &str) -> docent_embed::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| ModelError::malformed("test://embed", "unknown text"))
        }

        fn model_name(&self) -> &str {
            &self.model
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    /// Records the messages it receives and replies with a fixed answer.
    #[derive(Default)]
    struct RecordingChat {
        received: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatProvider for RecordingChat {
        async fn complete(&self, messages: &[ChatMessage]) -> docent_embed::Result<String> {
            self.received.lock().unwrap().push(messages.to_vec());
            Ok("It is blue.".to_string())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    struct Fixture {
        _dir: TempDir,
        embedder: Arc<TableEmbedder>,
        chat: Arc<RecordingChat>,
        retriever: Retriever,
    }

    async fn fixture(model: &str, save_index: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonIndexStore::new(dir.path().join("index.json")));

        if save_index {
            let mut builder = IndexBuilder::new("table", dir.path());
            builder
                .add_source(
                    "colors.md",
                    vec![
                        "The sky is blue.".to_string(),
                        "Grass is green.".to_string(),
                        "The sea is mostly blue.".to_string(),
                    ],
                    vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1]],
                )
                .unwrap();
            store.save(&builder.finish().unwrap()).await.unwrap();
        }

        let embedder = Arc::new(TableEmbedder {
            model: model.to_string(),
            table: HashMap::from([
                ("What color is the sky?".to_string(), vec![1.0, 0.0]),
                ("What color is grass?".to_string(), vec![0.0, 1.0]),
            ]),
            calls: AtomicUsize::new(0),
        });
        let chat = Arc::new(RecordingChat::default());
        let retriever = Retriever::new(
            CachedEmbedder::with_policy(embedder.clone(), CachePolicy::Unbounded),
            store,
            chat.clone(),
        );

        Fixture {
            _dir: dir,
            embedder,
            chat,
            retriever,
        }
    }

    #[tokio::test]
    async fn test_answer_context_ranks_and_joins() {
        let fx = fixture("table", true).await;
        let retrieved = fx
            .retriever
            .clone()
            .with_top_k(2)
            .answer_context("What color is the sky?")
            .await
            .unwrap();

        let chunks: Vec<usize> = retrieved.fragments.iter().map(|f| f.chunk).collect();
        assert_eq!(chunks, vec![0, 2]);
        assert_eq!(retrieved.context, "The sky is blue.\n\nThe sea is mostly blue.");
        assert!(retrieved.fragments[0].score >= retrieved.fragments[1].score);
        assert_eq!(retrieved.fragments[0].source, "colors.md");
    }

    #[tokio::test]
    async fn test_default_top_k_returns_all_when_fewer() {
        let fx = fixture("table", true).await;
        let retrieved = fx
            .retriever
            .answer_context("What color is grass?")
            .await
            .unwrap();

        assert_eq!(fx.retriever.top_k(), DEFAULT_TOP_K);
        assert_eq!(retrieved.fragments.len(), 3);
        assert_eq!(retrieved.fragments[0].text, "Grass is green.");
    }

    #[tokio::test]
    async fn test_repeated_question_uses_cache() {
        let fx = fixture("table", true).await;
        fx.retriever.answer_context("What color is the sky?").await.unwrap();
        fx.retriever.answer_context("What color is the sky?").await.unwrap();

        assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_index_propagates() {
        let fx = fixture("table", false).await;
        let err = fx
            .retriever
            .answer_context("What color is the sky?")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::IndexNotFound { .. }));
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let fx = fixture("table", true).await;
        let err = fx
            .retriever
            .answer_context("Something unknown")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Model(ModelError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_model_mismatch_only_warns() {
        let fx = fixture("other-model", true).await;
        let retrieved = fx
            .retriever
            .answer_context("What color is the sky?")
            .await
            .unwrap();

        assert_eq!(retrieved.fragments.len(), 3);
        assert!(logs_contain("Index was built with embedding model 'table'"));
    }

    #[tokio::test]
    async fn test_answer_builds_conversation() {
        let fx = fixture("table", true).await;
        let history = vec![Exchange::new("What color is grass?", "Green.")];
        let answer = fx
            .retriever
            .clone()
            .with_top_k(1)
            .with_system_prompt("Be terse.")
            .answer("What color is the sky?", &history)
            .await
            .unwrap();

        assert_eq!(answer.answer, "It is blue.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].text, "The sky is blue.");

        let received = fx.chat.received.lock().unwrap();
        let messages = &received[0];
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[0].content, "Be terse.");
        assert_eq!(
            messages[3].content,
            user_turn("The sky is blue.", "What color is the sky?")
        );
    }
}
