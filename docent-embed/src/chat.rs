//! Generation client used to answer questions from retrieved context.

use crate::config::ChatConfig;
use crate::error::{ModelError, Result};
use crate::http::{build_client, post_json};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A previous question and the answer that was given to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Assemble the message list for one completion.
///
/// The optional system prompt comes first, then each prior exchange as a
/// user/assistant pair in order, then `final_user`.
pub fn build_messages(
    system_prompt: Option<&str>,
    history: &[Exchange],
    final_user: impl Into<String>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    if let Some(prompt) = system_prompt {
        messages.push(ChatMessage::system(prompt));
    }
    for exchange in history {
        messages.push(ChatMessage::user(exchange.question.as_str()));
        messages.push(ChatMessage::assistant(exchange.answer.as_str()));
    }
    messages.push(ChatMessage::user(final_user));
    messages
}

/// A service that turns a conversation into the next assistant reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Produce the assistant's reply to `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Identifier of the generation model
    fn model_name(&self) -> &str;
}

/// Chat client for a generation service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    choices: Option<Vec<Choice>>,
}

impl ChatResponse {
    fn into_content(self) -> Option<String> {
        self.message.map(|m| m.content).or_else(|| {
            self.choices
                .and_then(|choices| choices.into_iter().next())
                .map(|choice| choice.message.content)
        })
    }
}

impl HttpChatProvider {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: build_client(config.timeout())?,
            endpoint: config.endpoint(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response: ChatResponse = post_json(&self.client, &self.endpoint, &request).await?;
        let content = response.into_content().ok_or_else(|| {
            ModelError::malformed(&self.endpoint, "response contained no completion")
        })?;

        tracing::debug!(
            "Completion of {} messages returned {} chars",
            messages.len(),
            content.len()
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
