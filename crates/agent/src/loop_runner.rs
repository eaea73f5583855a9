//! The agent orchestration loop.
//!
//! One `ask` execution drives this state machine until a terminal event:
//!
//! 1. **Stream a reply**, re-emitting each fragment as it arrives. Transport
//!    failures become a final diagnostic (retries already happened below).
//! 2. If the streamed text is empty — the sole trigger — **probe blocking
//!    mode** for native tool calls, dispatch them sequentially, append the
//!    results, steer the model, and restart.
//! 3. Otherwise try the **embedded-JSON instruction** in the text:
//!    `final_answer` terminates, `call_tool` dispatches, anything else makes
//!    the raw text the final answer. An empty reply with no instruction gets
//!    one steering nudge and restarts.
//!
//! Every execution emits exactly one `Final` event, unless the caller drops
//! the receiver and the loop stops mid-flight.

use std::sync::Arc;
use std::time::Instant;

use codemate_config::AgentConfig;
use codemate_core::error::ProviderError;
use codemate_core::event::{DomainEvent, EventBus};
use codemate_core::message::{Conversation, Message};
use codemate_core::provider::{Provider, ProviderRequest, ToolDefinition};
use codemate_core::tool::{ToolCall, ToolResult};
use codemate_github::RepoContext;
use codemate_tools::{SEARCH_CODE, ToolInvoker};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::AgentEvent;
use crate::extract::{
    AssistantReply, CallOrigin, Extraction, ProposedCall, default_extractors,
};
use crate::normalize::normalize_search_query;
use crate::prompt;

const STEER_AFTER_TOOLS: &str =
    "Continue reasoning with the tool results above and provide next step or final answer.";
const STEER_AFTER_TOOL: &str =
    "Continue reasoning with the tool result above and provide next step or final answer.";
const NUDGE_EMPTY_REPLY: &str =
    "Please provide a concise final answer summarizing findings and next steps.";
const RATE_LIMIT_FINAL: &str = "The upstream model API returned 429 Too Many Requests. \
     Please wait a few seconds and try again.";

/// Caller-supplied options for one `ask` execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    /// Extra diagnostic logging. No behavioral effect.
    pub debug: bool,

    /// Include raw tool payloads in `tool_result` events.
    pub show_raw_tool: bool,
}

/// The agent loop: provider, tools, and limits for `ask` executions.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    invoker: Arc<ToolInvoker>,
    repo_context: RepoContext,
    event_bus: Arc<EventBus>,
    max_turns: u32,
    tool_result_cap: usize,
    preview_cap: usize,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        invoker: Arc<ToolInvoker>,
        repo_context: RepoContext,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            invoker,
            repo_context,
            event_bus,
            max_turns: defaults.max_turns,
            tool_result_cap: defaults.tool_result_cap,
            preview_cap: defaults.preview_cap,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per model reply.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Apply loop limits from configuration.
    pub fn with_limits(mut self, config: &AgentConfig) -> Self {
        self.max_turns = config.max_turns;
        self.tool_result_cap = config.tool_result_cap;
        self.preview_cap = config.preview_cap;
        self
    }

    /// Ask a question about the current repository.
    ///
    /// Returns a lazily produced event sequence; consume it until the
    /// `Final` event. Dropping the receiver stops forward progress but does
    /// not abort an in-flight network call.
    pub fn ask(
        &self,
        question: impl Into<String>,
        history: Vec<Message>,
        options: AskOptions,
    ) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(64);
        let exec = LoopExec {
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            invoker: self.invoker.clone(),
            repo_context: self.repo_context.clone(),
            event_bus: self.event_bus.clone(),
            max_turns: self.max_turns,
            tool_result_cap: self.tool_result_cap,
            preview_cap: self.preview_cap,
            question: question.into(),
            history,
            options,
            tx,
        };
        tokio::spawn(exec.run());
        rx
    }
}

/// One running `ask` execution. Owns its conversation state.
struct LoopExec {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    invoker: Arc<ToolInvoker>,
    repo_context: RepoContext,
    event_bus: Arc<EventBus>,
    max_turns: u32,
    tool_result_cap: usize,
    preview_cap: usize,
    question: String,
    history: Vec<Message>,
    options: AskOptions,
    tx: mpsc::Sender<AgentEvent>,
}

enum StreamOutcome {
    /// The assembled reply text (possibly empty).
    Text(String),
    /// Transport failure, already shaped as a user-facing diagnostic.
    Failed(String),
    /// The caller dropped the receiver.
    Cancelled,
}

impl LoopExec {
    async fn run(self) {
        let repo = self.repo_context.current().await.to_string();
        let system_prompt = prompt::build_system_prompt(&repo);
        let mut conv = Conversation::seeded(&system_prompt, &self.history, &self.question);
        let tool_definitions = self.invoker.definitions();
        let extractors = default_extractors();

        for turn in 1..=self.max_turns {
            if self.options.debug {
                debug!(
                    conversation_id = %conv.id,
                    turn,
                    messages = conv.messages.len(),
                    "Agent loop turn"
                );
            }

            let request = self.request(&conv, &tool_definitions);

            // 1. Stream a reply, re-emitting fragments as they arrive
            let assembled = match self.stream_reply(request.clone()).await {
                StreamOutcome::Text(text) => text,
                StreamOutcome::Failed(diagnostic) => {
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "transport".into(),
                        error_message: diagnostic.clone(),
                        timestamp: chrono::Utc::now(),
                    });
                    let _ = self.emit(AgentEvent::Final { text: diagnostic }).await;
                    return;
                }
                StreamOutcome::Cancelled => return,
            };

            self.event_bus.publish(DomainEvent::ReplyReceived {
                conversation_id: conv.id.to_string(),
                model: self.model.clone(),
                streamed_chars: assembled.len(),
                timestamp: chrono::Utc::now(),
            });

            // 2. Empty streamed text is the sole trigger for the native probe:
            // a model that already streamed prose is not also issuing a
            // structured tool call
            let native = if assembled.trim().is_empty() {
                self.probe_native_tool_calls(request).await
            } else {
                None
            };

            let reply = AssistantReply {
                text: assembled.clone(),
                native: native.clone(),
            };

            let extraction = extractors
                .iter()
                .map(|x| x.extract(&reply))
                .find(|e| !matches!(e, Extraction::Nothing))
                .unwrap_or(Extraction::Nothing);

            match extraction {
                Extraction::Calls {
                    origin: CallOrigin::Native,
                    calls,
                } => {
                    // Record the assistant turn that requested the tools
                    if let Some(message) = native {
                        conv.push(message);
                    }
                    for call in &calls {
                        if !self.dispatch_native(call, &mut conv).await {
                            return;
                        }
                    }
                    conv.push(Message::user(STEER_AFTER_TOOLS));
                }
                Extraction::Calls {
                    origin: CallOrigin::Embedded,
                    calls,
                } => {
                    for call in &calls {
                        if !self.dispatch_embedded(call, &mut conv).await {
                            return;
                        }
                    }
                    conv.push(Message::user(STEER_AFTER_TOOL));
                }
                Extraction::FinalAnswer(answer) => {
                    let _ = self.emit(AgentEvent::Final { text: answer }).await;
                    return;
                }
                Extraction::Nothing => {
                    if assembled.trim().is_empty() {
                        // Don't emit an empty final; ask the model to answer
                        conv.push(Message::user(NUDGE_EMPTY_REPLY));
                    } else {
                        // Plain prose is the final natural-language answer
                        let _ = self.emit(AgentEvent::Final { text: assembled }).await;
                        return;
                    }
                }
            }

            debug!(turn, "Re-entering streaming with updated conversation");
        }

        warn!(max_turns = self.max_turns, "Loop exhausted its turn budget");
        let _ = self
            .emit(AgentEvent::Final {
                text: format!(
                    "Reached the maximum of {} reasoning turns without a final answer. \
                     Try narrowing the question.",
                    self.max_turns
                ),
            })
            .await;
    }

    fn request(&self, conv: &Conversation, tools: &[ToolDefinition]) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: conv.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
        }
    }

    /// Consume one streaming reply, re-emitting fragments in arrival order.
    async fn stream_reply(&self, request: ProviderRequest) -> StreamOutcome {
        let mut rx = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => return StreamOutcome::Failed(transport_diagnostic(&e)),
        };

        let mut assembled = String::new();
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => {
                    if let Some(delta) = chunk.content
                        && !delta.is_empty()
                    {
                        assembled.push_str(&delta);
                        if !self.emit(AgentEvent::Chunk { text: delta }).await {
                            return StreamOutcome::Cancelled;
                        }
                    }
                    if chunk.done {
                        return StreamOutcome::Text(chunk.full_text.unwrap_or(assembled));
                    }
                }
                Err(e) => return StreamOutcome::Failed(transport_diagnostic(&e)),
            }
        }

        // Stream closed without a terminal chunk; use what we assembled
        StreamOutcome::Text(assembled)
    }

    /// One blocking call with the same history, looking for native tool
    /// calls. Any failure here falls through to the text-based protocol.
    async fn probe_native_tool_calls(&self, request: ProviderRequest) -> Option<Message> {
        match self.provider.complete(request).await {
            Ok(response) if !response.message.tool_calls.is_empty() => Some(response.message),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Native tool-call probe failed, falling back to text protocol");
                None
            }
        }
    }

    /// Dispatch one native tool call: events, invocation, and a `tool`-role
    /// message answering the call id.
    async fn dispatch_native(&self, call: &ProposedCall, conv: &mut Conversation) -> bool {
        if !self
            .emit(AgentEvent::ToolCall {
                tool: call.name.clone(),
                args: call.args.clone(),
            })
            .await
        {
            return false;
        }

        let result = self.invoke_timed(call).await;
        if !self.emit_result(&call.name, &result).await {
            return false;
        }

        conv.push(Message::tool_result(
            &call.id,
            &call.name,
            truncate_chars(&result.output, self.tool_result_cap),
        ));
        true
    }

    /// Dispatch one text-embedded tool call: normalization, events,
    /// invocation, and an assistant-side `TOOL_RESULT:` marker message.
    async fn dispatch_embedded(&self, call: &ProposedCall, conv: &mut Conversation) -> bool {
        let mut call = call.clone();

        if call.name == SEARCH_CODE
            && let Some(raw_query) = call.args["query"].as_str()
        {
            let normalized = normalize_search_query(raw_query);
            if normalized.changed {
                let note = format!(
                    "Normalized query from '{}' to '{}' for reliable search",
                    normalized.original, normalized.cleaned
                );
                if !self.emit(AgentEvent::Reasoning { text: note }).await {
                    return false;
                }
                call.args["query"] = serde_json::Value::String(normalized.cleaned);
            }
        }

        if !self
            .emit(AgentEvent::ToolCall {
                tool: call.name.clone(),
                args: call.args.clone(),
            })
            .await
        {
            return false;
        }

        let result = self.invoke_timed(&call).await;
        if !self.emit_result(&call.name, &result).await {
            return false;
        }

        conv.push(Message::assistant(format!(
            "TOOL_RESULT: {}",
            truncate_chars(&result.output, self.tool_result_cap)
        )));
        true
    }

    /// Invoke through the never-throws boundary, timing and publishing the
    /// outcome.
    async fn invoke_timed(&self, call: &ProposedCall) -> ToolResult {
        let start = Instant::now();
        let result = self
            .invoker
            .invoke(&ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.args.clone(),
            })
            .await;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });

        result
    }

    async fn emit_result(&self, tool: &str, result: &ToolResult) -> bool {
        let raw = if self.options.show_raw_tool {
            result.data.clone()
        } else {
            None
        };
        self.emit(AgentEvent::ToolResult {
            tool: tool.to_string(),
            preview: preview_of(&result.output, self.preview_cap),
            raw,
        })
        .await
    }

    /// Send one event; `false` means the caller dropped the receiver.
    async fn emit(&self, event: AgentEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// Shape a transport error as a user-facing final diagnostic.
fn transport_diagnostic(error: &ProviderError) -> String {
    if error.is_rate_limit() {
        RATE_LIMIT_FINAL.to_string()
    } else {
        format!("Unexpected error while streaming: {error}")
    }
}

/// Char-safe prefix truncation.
fn truncate_chars(s: &str, cap: usize) -> String {
    s.chars().take(cap).collect()
}

/// Bounded preview with an ellipsis when truncated.
fn preview_of(output: &str, cap: usize) -> String {
    if output.chars().count() > cap {
        format!("{}...", truncate_chars(output, cap))
    } else {
        output.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codemate_core::error::ToolError;
    use codemate_core::message::{MessageToolCall, Role};
    use codemate_core::provider::{ProviderResponse, StreamChunk};
    use codemate_core::tool::{Tool, ToolRegistry};
    use codemate_github::RepoSlug;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A provider that replays scripted stream and completion replies, and
    /// records every request it receives.
    struct ScriptedProvider {
        streams: Mutex<VecDeque<Result<String, ProviderError>>>,
        completions: Mutex<VecDeque<ProviderResponse>>,
        stream_requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(
            streams: Vec<Result<&str, ProviderError>>,
            completions: Vec<ProviderResponse>,
        ) -> Arc<Self> {
            Arc::new(Self {
                streams: Mutex::new(
                    streams
                        .into_iter()
                        .map(|r| r.map(String::from))
                        .collect(),
                ),
                completions: Mutex::new(completions.into_iter().collect()),
                stream_requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_requests(&self) -> Vec<ProviderRequest> {
            self.stream_requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.completions
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::NotConfigured("no scripted completion".into()))
        }

        async fn stream(
            &self,
            request: ProviderRequest,
        ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
            self.stream_requests.lock().unwrap().push(request);
            let text = self
                .streams
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(String::new()))?;

            let (tx, rx) = mpsc::channel(4);
            tokio::spawn(async move {
                if !text.is_empty() {
                    let _ = tx.send(Ok(StreamChunk::delta(text.as_str()))).await;
                }
                let _ = tx.send(Ok(StreamChunk::finished(text))).await;
            });
            Ok(rx)
        }
    }

    struct FileStub;

    #[async_trait]
    impl Tool for FileStub {
        fn name(&self) -> &str {
            "get_file_contents"
        }
        fn description(&self) -> &str {
            "stubbed file read"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(
                "",
                serde_json::json!({"path": "a.py", "content": "x=1"}),
            ))
        }
    }

    struct RecordingSearch {
        queries: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Tool for RecordingSearch {
        fn name(&self) -> &str {
            "search_code"
        }
        fn description(&self) -> &str {
            "stubbed search"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
        }
        async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError> {
            self.queries
                .lock()
                .unwrap()
                .push(args["query"].as_str().unwrap_or_default().to_string());
            Ok(ToolResult::ok(
                "",
                serde_json::json!({"total_matches": 0, "filename_matches": [], "content_matches": []}),
            ))
        }
    }

    fn agent_with(
        provider: Arc<ScriptedProvider>,
        tools: Vec<Box<dyn Tool>>,
        max_turns: u32,
    ) -> AgentLoop {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        AgentLoop::new(
            provider,
            "test-model",
            Arc::new(ToolInvoker::new(Arc::new(registry))),
            RepoContext::new(RepoSlug::new("octocat", "hello-world")),
            Arc::new(EventBus::default()),
        )
        .with_limits(&AgentConfig {
            max_turns,
            tool_result_cap: 4000,
            preview_cap: 1200,
        })
    }

    async fn collect(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn assert_single_final(events: &[AgentEvent]) -> &str {
        let finals: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Final { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(finals.len(), 1, "expected exactly one final event: {events:?}");
        assert!(
            events.last().unwrap().is_terminal(),
            "final must be the last event"
        );
        finals[0]
    }

    #[tokio::test]
    async fn plain_text_reply_terminates_in_one_turn() {
        let provider = ScriptedProvider::new(vec![Ok("The answer is 42.")], vec![]);
        let agent = agent_with(provider.clone(), vec![], 16);

        let events = collect(agent.ask("why?", vec![], AskOptions::default())).await;

        assert!(matches!(&events[0], AgentEvent::Chunk { text } if text == "The answer is 42."));
        assert_eq!(assert_single_final(&events), "The answer is 42.");
        assert_eq!(provider.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn conversation_is_seeded_system_history_question() {
        let provider = ScriptedProvider::new(vec![Ok("ok")], vec![]);
        let agent = agent_with(provider.clone(), vec![], 16);

        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let _ = collect(agent.ask("new question", history, AskOptions::default())).await;

        let request = &provider.recorded_requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("octocat/hello-world"));
        assert_eq!(request.messages[1].content, "earlier");
        assert_eq!(request.messages[2].content, "reply");
        assert_eq!(request.messages[3].content, "new question");
    }

    #[tokio::test]
    async fn native_tool_call_path() {
        let native_reply = ProviderResponse {
            message: Message::assistant_with_tool_calls(
                "",
                vec![MessageToolCall {
                    id: "call_abc".into(),
                    name: "get_file_contents".into(),
                    arguments: r#"{"path": "a.py"}"#.into(),
                }],
            ),
            model: "test-model".into(),
            usage: None,
        };
        let provider = ScriptedProvider::new(
            vec![Ok(""), Ok("The file sets x to 1.")],
            vec![native_reply],
        );
        let agent = agent_with(provider.clone(), vec![Box::new(FileStub)], 16);

        let events = collect(agent.ask("what is in a.py?", vec![], AskOptions::default())).await;

        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolCall { tool, args } if tool == "get_file_contents" && args["path"] == "a.py"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolResult { preview, raw, .. } if preview.contains("x=1") && raw.is_none()
        )));
        assert_eq!(assert_single_final(&events), "The file sets x to 1.");

        // The second streaming request carries the full tool exchange
        let requests = provider.recorded_requests();
        assert_eq!(requests.len(), 2);
        let messages = &requests[1].messages;

        let tool_messages: Vec<_> = messages.iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(tool_messages.len(), 1, "exactly one tool message");
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_abc"));
        assert!(tool_messages[0].content.contains("x=1"));

        let announcing = messages
            .iter()
            .find(|m| !m.tool_calls.is_empty())
            .expect("assistant message recording the tool calls");
        assert_eq!(announcing.tool_calls[0].id, "call_abc");

        assert_eq!(messages.last().unwrap().content, STEER_AFTER_TOOLS);
    }

    #[tokio::test]
    async fn embedded_final_answer_is_extracted() {
        let provider = ScriptedProvider::new(
            vec![Ok(
                r#"Some analysis. {"action":"final_answer","answer":"Bug found on line 5"} Done."#,
            )],
            vec![],
        );
        let agent = agent_with(provider, vec![], 16);

        let events = collect(agent.ask("find the bug", vec![], AskOptions::default())).await;
        assert_eq!(assert_single_final(&events), "Bug found on line 5");
    }

    #[tokio::test]
    async fn embedded_tool_call_normalizes_search_query() {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let provider = ScriptedProvider::new(
            vec![
                Ok(r#"{"action":"_call_tool","tool":"search_code","args":{"query":"  find   bug.py  "}}"#),
                Ok("No bugs found."),
            ],
            vec![],
        );
        let agent = agent_with(
            provider.clone(),
            vec![Box::new(RecordingSearch {
                queries: queries.clone(),
            })],
            16,
        );

        let events = collect(agent.ask("look for bugs", vec![], AskOptions::default())).await;

        let reasoning: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::Reasoning { .. }))
            .collect();
        assert_eq!(reasoning.len(), 1, "one reasoning event for the rewrite");
        assert!(matches!(
            reasoning[0],
            AgentEvent::Reasoning { text } if text.contains("find bug.py")
        ));

        assert_eq!(queries.lock().unwrap().as_slice(), ["find bug.py"]);
        assert_eq!(assert_single_final(&events), "No bugs found.");

        // Text path records an assistant-side marker, then steering
        let messages = &provider.recorded_requests()[1].messages;
        let marker = messages
            .iter()
            .find(|m| m.role == Role::Assistant && m.content.starts_with("TOOL_RESULT: "))
            .expect("TOOL_RESULT marker message");
        assert!(marker.content.contains("total_matches"));
        assert_eq!(messages.last().unwrap().content, STEER_AFTER_TOOL);
    }

    #[tokio::test]
    async fn empty_reply_gets_one_nudge_then_answer() {
        let provider = ScriptedProvider::new(vec![Ok(""), Ok("Here is the answer.")], vec![]);
        let agent = agent_with(provider.clone(), vec![], 16);

        let events = collect(agent.ask("hello?", vec![], AskOptions::default())).await;
        assert_eq!(assert_single_final(&events), "Here is the answer.");

        let messages = &provider.recorded_requests()[1].messages;
        assert_eq!(messages.last().unwrap().content, NUDGE_EMPTY_REPLY);
        assert_eq!(messages.last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn rate_limit_becomes_final_diagnostic() {
        let provider = ScriptedProvider::new(
            vec![Err(ProviderError::RateLimited(
                "429 Too Many Requests".into(),
            ))],
            vec![],
        );
        let agent = agent_with(provider, vec![], 16);

        let events = collect(agent.ask("hi", vec![], AskOptions::default())).await;
        let final_text = assert_single_final(&events);
        assert!(final_text.contains("429"));
    }

    #[tokio::test]
    async fn unexpected_transport_error_becomes_final_diagnostic() {
        let provider = ScriptedProvider::new(
            vec![Err(ProviderError::ApiError {
                status_code: 404,
                message: "model not found".into(),
            })],
            vec![],
        );
        let agent = agent_with(provider, vec![], 16);

        let events = collect(agent.ask("hi", vec![], AskOptions::default())).await;
        let final_text = assert_single_final(&events);
        assert!(final_text.contains("Unexpected error while streaming"));
    }

    #[tokio::test]
    async fn turn_budget_exhaustion_is_a_final_diagnostic() {
        // Every turn streams nothing and the native probe has nothing either
        let provider = ScriptedProvider::new(vec![Ok(""), Ok("")], vec![]);
        let agent = agent_with(provider, vec![], 2);

        let events = collect(agent.ask("hi", vec![], AskOptions::default())).await;
        let final_text = assert_single_final(&events);
        assert!(final_text.contains("maximum of 2 reasoning turns"));
    }

    #[tokio::test]
    async fn raw_payload_gated_by_flag() {
        let script = r#"{"action":"call_tool","tool":"get_file_contents","args":{"path":"a.py"}}"#;
        for (show_raw, expect_raw) in [(false, false), (true, true)] {
            let provider =
                ScriptedProvider::new(vec![Ok(script), Ok("done")], vec![]);
            let agent = agent_with(provider, vec![Box::new(FileStub)], 16);

            let events = collect(agent.ask(
                "read it",
                vec![],
                AskOptions {
                    debug: false,
                    show_raw_tool: show_raw,
                },
            ))
            .await;

            let result = events
                .iter()
                .find_map(|e| match e {
                    AgentEvent::ToolResult { raw, .. } => Some(raw),
                    _ => None,
                })
                .expect("tool result event");
            assert_eq!(result.is_some(), expect_raw);
        }
    }

    #[tokio::test]
    async fn unknown_tool_keeps_the_conversation_alive() {
        let provider = ScriptedProvider::new(
            vec![
                Ok(r#"{"action":"call_tool","tool":"teleport","args":{}}"#),
                Ok("I could not use that tool."),
            ],
            vec![],
        );
        let agent = agent_with(provider.clone(), vec![], 16);

        let events = collect(agent.ask("go", vec![], AskOptions::default())).await;

        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolResult { preview, .. } if preview.contains("Tool not found")
        )));
        assert_eq!(assert_single_final(&events), "I could not use that tool.");
    }

    #[test]
    fn truncation_helpers() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(preview_of("short", 10), "short");
        assert_eq!(preview_of("0123456789abc", 10), "0123456789...");
    }
}
