//! Tool-call extraction strategies.
//!
//! The backend surfaces tool-call intents two ways: a structured
//! `tool_calls` array in blocking replies, or a JSON instruction embedded in
//! free text. Both are modeled as [`ToolCallExtractor`] strategies over a
//! common [`AssistantReply`], tried in fixed priority order — native first.

use codemate_core::message::Message;
use uuid::Uuid;

/// An assistant reply as seen by the extractors: the streamed text plus,
/// when the loop probed blocking mode, the structured message it returned.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    pub native: Option<Message>,
}

/// Where an extracted call came from; the loop records results differently
/// per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOrigin {
    Native,
    Embedded,
}

/// One proposed tool invocation.
#[derive(Debug, Clone)]
pub struct ProposedCall {
    /// Correlation id: the provider's for native calls, synthesized for
    /// embedded ones.
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// What one strategy read out of a reply.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// Tool calls to dispatch.
    Calls {
        origin: CallOrigin,
        calls: Vec<ProposedCall>,
    },

    /// An explicit final answer.
    FinalAnswer(String),

    /// This strategy has no opinion; try the next one.
    Nothing,
}

/// A strategy for reading proposed tool calls out of a reply.
pub trait ToolCallExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, reply: &AssistantReply) -> Extraction;
}

/// Native structured `tool_calls` from a blocking reply.
pub struct NativeToolCalls;

impl ToolCallExtractor for NativeToolCalls {
    fn name(&self) -> &'static str {
        "native"
    }

    fn extract(&self, reply: &AssistantReply) -> Extraction {
        let Some(native) = &reply.native else {
            return Extraction::Nothing;
        };
        if native.tool_calls.is_empty() {
            return Extraction::Nothing;
        }

        let calls = native
            .tool_calls
            .iter()
            .map(|tc| ProposedCall {
                id: tc.id.clone(),
                name: tc.name.clone(),
                // Unparseable argument strings degrade to empty args
                args: serde_json::from_str(&tc.arguments)
                    .unwrap_or_else(|_| serde_json::json!({})),
            })
            .collect();

        Extraction::Calls {
            origin: CallOrigin::Native,
            calls,
        }
    }
}

/// A JSON instruction embedded in the reply text:
/// `{"action": "final_answer", "answer": ...}` or
/// `{"action": "call_tool", "tool": ..., "args": {...}}`.
pub struct EmbeddedJson;

impl ToolCallExtractor for EmbeddedJson {
    fn name(&self) -> &'static str {
        "embedded-json"
    }

    fn extract(&self, reply: &AssistantReply) -> Extraction {
        let Some(obj) = extract_json_object(&reply.text) else {
            return Extraction::Nothing;
        };

        match obj["action"].as_str() {
            Some("final_answer") => {
                Extraction::FinalAnswer(obj["answer"].as_str().unwrap_or_default().to_string())
            }
            // The original instruction format spelled this with a leading
            // underscore; accept both.
            Some("call_tool") | Some("_call_tool") => {
                let Some(name) = obj["tool"].as_str().filter(|n| !n.is_empty()) else {
                    return Extraction::Nothing;
                };
                let args = obj
                    .get("args")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                Extraction::Calls {
                    origin: CallOrigin::Embedded,
                    calls: vec![ProposedCall {
                        id: format!("text_{}", Uuid::new_v4()),
                        name: name.to_string(),
                        args,
                    }],
                }
            }
            // Parsed JSON but not a recognized instruction
            _ => Extraction::Nothing,
        }
    }
}

/// Locate and parse the JSON object spanning the first `{` and last `}`.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// The strategies in priority order.
pub fn default_extractors() -> Vec<Box<dyn ToolCallExtractor>> {
    vec![Box::new(NativeToolCalls), Box::new(EmbeddedJson)]
}
