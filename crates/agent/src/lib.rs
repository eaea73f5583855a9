//! The core agent loop — the heart of codemate.
//!
//! One `ask` execution drives a **stream → recover → dispatch** cycle:
//!
//! 1. **Stream** a model reply, re-emitting fragments to the caller
//! 2. **If the text came back empty**, probe blocking mode for native tool
//!    calls; otherwise look for a JSON instruction embedded in the text
//! 3. **Dispatch** recognized tool calls, append the results, steer the
//!    model, and loop back to step 1
//!
//! The loop ends with exactly one `Final` event: an explicit final answer,
//! plain prose treated as the answer, an unrecoverable transport diagnostic,
//! or turn-budget exhaustion.

pub mod event;
pub mod extract;
pub mod loop_runner;
pub mod normalize;
pub mod prompt;

pub use event::AgentEvent;
pub use extract::{
    AssistantReply, CallOrigin, EmbeddedJson, Extraction, NativeToolCalls, ProposedCall,
    ToolCallExtractor,
};
pub use loop_runner::{AgentLoop, AskOptions};
pub use normalize::{NormalizedQuery, normalize_search_query};
