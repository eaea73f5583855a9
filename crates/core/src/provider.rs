//! Provider trait — the abstraction over the model backend.
//!
//! A Provider knows how to send a conversation to an LLM endpoint and get a
//! reply back, either as a complete message (blocking mode) or as a stream of
//! content deltas (streaming mode). The agent loop needs both: streaming for
//! latency, blocking to recover native tool-call intents that some backends
//! only surface in non-streaming replies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "llama3-8b-8192")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message, including any native tool calls
    pub message: Message,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics, when the backend reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
///
/// The stream is a finite sequence of content deltas; the final chunk is
/// tagged `done: true` and carries the full assembled text, so end-of-stream
/// is never a sentinel value indistinguishable from real content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the terminal chunk
    #[serde(default)]
    pub done: bool,

    /// The concatenation of every delta, present only on the terminal chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
}

impl StreamChunk {
    /// A content delta chunk.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
            full_text: None,
        }
    }

    /// The terminal chunk carrying the assembled reply.
    pub fn finished(full_text: impl Into<String>) -> Self {
        Self {
            content: None,
            done: true,
            full_text: Some(full_text.into()),
        }
    }
}

/// The core Provider trait.
///
/// The agent loop calls `stream()` for every turn and falls back to
/// `complete()` only to probe for native tool calls — pure polymorphism,
/// so tests can script replies with a mock implementation.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "groq").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// The sequence is not restartable — a fresh call re-issues the whole
    /// request with the full message history. Default implementation calls
    /// `complete()` and wraps the result as one delta plus a terminal chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.complete(request).await?;
        let text = response.message.content;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        if !text.is_empty() {
            let _ = tx.send(Ok(StreamChunk::delta(text.as_str()))).await;
        }
        let _ = tx.send(Ok(StreamChunk::finished(text))).await;
        Ok(rx)
    }
}
