//! Agent-level streaming events.
//!
//! `AgentEvent` is the externally observable output of one `ask` execution:
//! a lazy sequence the UI consumes until the single terminal `final` event.
//!
//! - `chunk`       — partial text token from the LLM, re-emitted as it arrives
//! - `reasoning`   — diagnostic note (e.g. a query rewrite before dispatch)
//! - `tool_call`   — the agent is invoking a tool
//! - `tool_result` — tool execution completed (raw payload only on request)
//! - `final`       — the terminal event: answer or unrecoverable diagnostic

use serde::{Deserialize, Serialize};

/// Events emitted by the agent during one loop execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Partial text token from the LLM.
    Chunk { text: String },

    /// A reasoning / diagnostic note.
    Reasoning { text: String },

    /// The agent is calling a tool.
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        tool: String,
        preview: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<serde_json::Value>,
    },

    /// The terminal event: the final answer, or a final diagnostic.
    Final { text: String },
}

impl AgentEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Reasoning { .. } => "reasoning",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Final { .. } => "final",
        }
    }

    /// Whether this event ends the loop execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentEvent::Chunk {
            text: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""text":"Hello""#));
    }

    #[test]
    fn event_serialization_tool_call() {
        let event = AgentEvent::ToolCall {
            tool: "search_code".into(),
            args: serde_json::json!({"query": "average"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""tool":"search_code""#));
    }

    #[test]
    fn tool_result_omits_raw_when_absent() {
        let event = AgentEvent::ToolResult {
            tool: "list_files".into(),
            preview: "{}".into(),
            raw: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("raw"));

        let event = AgentEvent::ToolResult {
            tool: "list_files".into(),
            preview: "{}".into(),
            raw: Some(serde_json::json!({"files": []})),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""raw""#));
    }

    #[test]
    fn terminal_detection() {
        assert!(AgentEvent::Final { text: "done".into() }.is_terminal());
        assert!(!AgentEvent::Chunk { text: "x".into() }.is_terminal());
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AgentEvent::Chunk { text: "x".into() }.event_type(), "chunk");
        assert_eq!(
            AgentEvent::Reasoning { text: "x".into() }.event_type(),
            "reasoning"
        );
        assert_eq!(
            AgentEvent::Final { text: "x".into() }.event_type(),
            "final"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"final","text":"Bug found on line 5"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::Final { text } => assert_eq!(text, "Bug found on line 5"),
            _ => panic!("Wrong variant"),
        }
    }
}
