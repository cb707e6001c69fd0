//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{ModelError, Result};
use crate::http::{build_client, post_json};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text. Never cached.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the model producing the vectors
    fn model_name(&self) -> &str;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Provider backed by a remote embedding service reached over HTTP.
///
/// Each call posts `{"model": ..., "input": ...}` to the configured endpoint
/// and is independent of every other call, so callers may issue many
/// concurrently. The underlying [`reqwest::Client`] pools connections and is
/// cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Accepts the response shapes embedding servers commonly return: a bare
/// vector, a bare list of vectors, or an object carrying a single
/// `embedding`, a list of `embeddings`, or an OpenAI-style `data` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Vector(Vec<f32>),
    Vectors(Vec<Vec<f32>>),
    Object(EmbedObject),
}

#[derive(Debug, Default, Deserialize)]
struct EmbedObject {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    data: Option<Vec<EmbeddingData>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbedResponse {
    fn into_first_vector(self) -> Option<Vec<f32>> {
        let candidate = match self {
            EmbedResponse::Vector(vector) => Some(vector),
            EmbedResponse::Vectors(all) => all.into_iter().next(),
            EmbedResponse::Object(object) => object
                .embedding
                .or_else(|| object.embeddings.and_then(|all| all.into_iter().next()))
                .or_else(|| {
                    object
                        .data
                        .and_then(|all| all.into_iter().next())
                        .map(|entry| entry.embedding)
                }),
        };
        candidate.filter(|vector| !vector.is_empty())
    }
}

impl HttpEmbeddingProvider {
    /// Creates a provider for the service described by `config`.
    pub fn new(config: &EmbedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: build_client(config.timeout())?,
            endpoint: config.endpoint(),
            model: config.model.clone(),
        })
    }

    /// URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let response: EmbedResponse = post_json(&self.client, &self.endpoint, &request).await?;
        let vector = response.into_first_vector().ok_or_else(|| {
            ModelError::malformed(&self.endpoint, "response contained no embedding vector")
        })?;
        // Out-of-range numbers parse as infinity and cannot be stored.
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(ModelError::malformed(
                &self.endpoint,
                "embedding contains non-finite values",
            ));
        }

        tracing::trace!("Embedded {} chars into {} dims", text.len(), vector.len());
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<Vec<f32>> {
        serde_json::from_str::<EmbedResponse>(json)
            .unwrap()
            .into_first_vector()
    }

    #[test]
    fn test_single_vector_response() {
        assert_eq!(parse(r#"{"embedding": [0.5, -1.0]}"#), Some(vec![0.5, -1.0]));
    }

    #[test]
    fn test_first_of_many_vectors() {
        assert_eq!(
            parse(r#"{"model": "m", "embeddings": [[1.0, 2.0], [3.0, 4.0]]}"#),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(
            parse(r#"{"data": [{"embedding": [0.25], "index": 0}]}"#),
            Some(vec![0.25])
        );
    }

    #[test]
    fn test_bare_array_responses() {
        assert_eq!(parse("[0.1, 0.2]"), Some(vec![0.1, 0.2]));
        assert_eq!(parse("[[0.1, 0.2], [0.3, 0.4]]"), Some(vec![0.1, 0.2]));
        assert_eq!(parse("[]"), None);
        assert_eq!(parse("[[]]"), None);
    }

    #[test]
    fn test_missing_or_empty_vectors() {
        assert_eq!(parse(r#"{}"#), None);
        assert_eq!(parse(r#"{"embeddings": []}"#), None);
        assert_eq!(parse(r#"{"embedding": []}"#), None);
    }

    #[test]
    fn test_provider_rejects_invalid_config() {
        let config = EmbedConfig::new("ftp://nowhere", "nomic-embed-text");
        assert!(matches!(
            HttpEmbeddingProvider::new(&config),
            Err(ModelError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_provider_metadata() {
        let provider = HttpEmbeddingProvider::new(&EmbedConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.provider_name(), "http");
        assert_eq!(provider.endpoint(), "http://localhost:11434/api/embed");
    }
}
