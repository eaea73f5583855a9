//! OpenAI-compatible transport implementation.
//!
//! Works with Groq and any other endpoint exposing the OpenAI
//! `/chat/completions` shape.
//!
//! Supports:
//! - Blocking chat completions, surfacing native `tool_calls`
//! - Streaming SSE completions, decoded into content deltas with a tagged
//!   terminal chunk carrying the full assembled text
//! - Retry with backoff for rate limits, 5xx, and network failures

use std::time::Duration;

use async_trait::async_trait;
use codemate_core::error::ProviderError;
use codemate_core::message::{Message, MessageToolCall, Role};
use codemate_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::retry::{RetryPolicy, StatusClass, classify_status, retry_hint};

/// An OpenAI-compatible model transport.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    stream_timeout: Duration,
    blocking_timeout: Duration,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible transport.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
            retry: RetryPolicy::default(),
            stream_timeout: Duration::from_secs(300),
            blocking_timeout: Duration::from_secs(60),
        }
    }

    /// Create a Groq transport (convenience constructor).
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new("groq", "https://api.groq.com/openai/v1", api_key)
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the request body shared by both modes.
    fn request_body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
            "response_format": { "type": "text" },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tool_choice"] = serde_json::json!("auto");
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Issue the POST, applying the retry policy.
    ///
    /// Returns the first response that is neither rate-limited nor a
    /// transient failure; non-retriable errors propagate immediately, and an
    /// exhausted budget surfaces the last observed error.
    async fn send_with_retry(
        &self,
        body: &serde_json::Value,
        accept_sse: bool,
        timeout: Duration,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..self.retry.max_attempts {
            let mut req = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .timeout(timeout)
                .json(body);
            if accept_sse {
                req = req.header("Accept", "text/event-stream");
            }

            let response = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    // Network-level error: retry on the backoff schedule
                    let err = ProviderError::Network(e.to_string());
                    warn!(provider = %self.name, attempt, error = %err, "Request failed, retrying");
                    last_error = Some(err);
                    tokio::time::sleep(self.retry.delay(attempt, None)).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            match classify_status(status) {
                StatusClass::Ok => return Ok(response),
                StatusClass::RateLimited => {
                    let hint = retry_hint(response.headers());
                    let delay = self.retry.delay(attempt, hint);
                    warn!(
                        provider = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "429 Too Many Requests, backing off"
                    );
                    last_error = Some(ProviderError::RateLimited(
                        "429 Too Many Requests".into(),
                    ));
                    tokio::time::sleep(delay).await;
                }
                StatusClass::Transient => {
                    let delay = self.retry.delay(attempt, None);
                    warn!(provider = %self.name, status, attempt, "Server error, backing off");
                    last_error = Some(ProviderError::ApiError {
                        status_code: status,
                        message: format!("{status} Server Error"),
                    });
                    tokio::time::sleep(delay).await;
                }
                StatusClass::Unauthorized => {
                    return Err(ProviderError::AuthenticationFailed(
                        "Invalid API key or insufficient permissions".into(),
                    ));
                }
                StatusClass::Fatal => {
                    let message = response.text().await.unwrap_or_default();
                    return Err(ProviderError::ApiError {
                        status_code: status,
                        message,
                    });
                }
            }
        }

        // Budget exhausted: surface the last thing we saw
        match last_error {
            Some(ProviderError::RateLimited(msg)) => Err(ProviderError::RateLimited(msg)),
            Some(err) => Err(ProviderError::RetriesExhausted {
                attempts: self.retry.max_attempts,
                last_error: err.to_string(),
            }),
            None => Err(ProviderError::RetriesExhausted {
                attempts: self.retry.max_attempts,
                last_error: "no attempts were made".into(),
            }),
        }
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                name: m.tool_name.clone(),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl codemate_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = self.request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending blocking completion request");

        let response = self
            .send_with_retry(&body, false, self.blocking_timeout)
            .await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let message = Message::assistant_with_tool_calls(
            choice.message.content.unwrap_or_default(),
            tool_calls,
        );

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            model: api_response.model,
            usage,
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let body = self.request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .send_with_retry(&body, true, self.stream_timeout)
            .await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and decode content deltas
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut assembled = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    // Skip empty lines and SSE comments
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    // "[DONE]" signals end of stream
                    if data == "[DONE]" {
                        let _ = tx.send(Ok(StreamChunk::finished(assembled))).await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            let Some(choice) = stream_resp.choices.first() else {
                                continue;
                            };
                            if let Some(content) = &choice.delta.content
                                && !content.is_empty()
                            {
                                assembled.push_str(content);
                                if tx
                                    .send(Ok(StreamChunk::delta(content.as_str())))
                                    .await
                                    .is_err()
                                {
                                    return; // receiver dropped
                                }
                            }
                        }
                        Err(e) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE] — still deliver the assembled text
            let _ = tx.send(Ok(StreamChunk::finished(assembled))).await;
        });

        Ok(rx)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
