//! Configuration for the remote model clients

use crate::error::{ModelError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base URL of a model server running on the local machine.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Embedding model used when none is configured.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Generation model used when none is configured.
pub const DEFAULT_CHAT_MODEL: &str = "llama3";

fn join_endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

fn validate_common(base_url: &str, model: &str, timeout_secs: u64) -> Result<()> {
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ModelError::invalid_config(format!(
            "base_url must start with http:// or https://, got '{base_url}'"
        )));
    }
    if model.trim().is_empty() {
        return Err(ModelError::invalid_config("model name is empty"));
    }
    if timeout_secs == 0 {
        return Err(ModelError::invalid_config("timeout_secs must be at least 1"));
    }
    Ok(())
}

/// Configuration for the embedding service client
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Base URL of the embedding service (e.g., "http://localhost:11434")
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    /// Identifier of the embedding model, sent with every request
    #[builder(default = "DEFAULT_EMBEDDING_MODEL.to_string()")]
    pub model: String,
    /// Per-request timeout in seconds
    #[builder(default = "30")]
    pub timeout_secs: u64,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a configuration for `model` served at `base_url`
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout (builder style)
    pub fn with_timeout_secs(self, timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..self
        }
    }

    /// Full URL embedding requests are posted to
    pub fn endpoint(&self) -> String {
        join_endpoint(&self.base_url, "api/embed")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that the configuration can be used to build a client
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.base_url, &self.model, self.timeout_secs)
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Configuration for the generation service client
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the generation service
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    /// Identifier of the generation model
    #[builder(default = "DEFAULT_CHAT_MODEL.to_string()")]
    pub model: String,
    /// Per-request timeout in seconds; completions are slow, so this is generous
    #[builder(default = "120")]
    pub timeout_secs: u64,
}

impl ChatConfig {
    /// Create a new generation configuration using the builder
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Create a configuration for `model` served at `base_url`
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Full URL chat requests are posted to
    pub fn endpoint(&self) -> String {
        join_endpoint(&self.base_url, "api/chat")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that the configuration can be used to build a client
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.base_url, &self.model, self.timeout_secs)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            timeout_secs: 120,
        }
    }
}
