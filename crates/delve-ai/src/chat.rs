//! Chat completions with a running conversation history.

use serde::{Deserialize, Serialize};

use crate::client::{AuthScheme, ParallelClient};
use crate::error::{AiError, Result};

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "speed";

const EMPTY_RESPONSE: &str = "No response generated";

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ParallelClient {
    /// Send a full message list and return the assistant's reply.
    pub async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };
        let response: ChatResponse = self
            .post_json("/chat/completions", AuthScheme::Bearer, &request)
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| EMPTY_RESPONSE.to_string());
        Ok(content)
    }
}

/// A conversation with the chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatSession {
    client: ParallelClient,
    model: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(client: ParallelClient) -> Self {
        Self {
            client,
            model: DEFAULT_CHAT_MODEL.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send a user message.
    ///
    /// On success the user turn and one assistant turn are appended to the
    /// history. On failure the history is left as it was.
    pub async fn send(&mut self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(AiError::InvalidInput("message is empty".into()));
        }

        let mut messages = self.messages.clone();
        messages.push(ChatMessage::user(text));
        let reply = self.client.chat_completion(&self.model, &messages).await?;

        messages.push(ChatMessage::assistant(reply.clone()));
        self.messages = messages;
        Ok(reply)
    }
}
