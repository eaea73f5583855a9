//! Repository tool implementations for codemate.
//!
//! Tools give the agent the ability to inspect the repository under
//! discussion: search code, read files, list directories, fetch metadata,
//! and switch to a different repository. All of them wrap the shared
//! [`GitHubClient`].

pub mod file_contents;
pub mod list_all_files;
pub mod list_files;
pub mod repo_info;
pub mod search_code;
pub mod switch_repo;

use std::sync::Arc;

use codemate_core::tool::{ToolCall, ToolRegistry, ToolResult};
use codemate_github::GitHubClient;
use tracing::warn;

pub use file_contents::FileContentsTool;
pub use list_all_files::ListAllFilesTool;
pub use list_files::ListFilesTool;
pub use repo_info::RepoInfoTool;
pub use search_code::SearchCodeTool;
pub use switch_repo::SwitchRepoTool;

/// Name of the search tool — the agent loop normalizes its queries.
pub const SEARCH_CODE: &str = "search_code";

/// Create the default tool registry backed by one GitHub client.
pub fn default_registry(client: Arc<GitHubClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchCodeTool::new(client.clone())));
    registry.register(Box::new(FileContentsTool::new(client.clone())));
    registry.register(Box::new(ListFilesTool::new(client.clone())));
    registry.register(Box::new(RepoInfoTool::new(client.clone())));
    registry.register(Box::new(SwitchRepoTool::new(client.clone())));
    registry.register(Box::new(ListAllFilesTool::new(client)));
    registry
}

/// The dispatch boundary between the agent loop and the tools.
///
/// `invoke` never fails: unknown tool names and execution errors come back
/// as failure-shaped [`ToolResult`]s, because the loop depends on always
/// being able to append a tool message before re-invoking the model.
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Tool definitions to advertise to the model.
    pub fn definitions(&self) -> Vec<codemate_core::provider::ToolDefinition> {
        self.registry.definitions()
    }

    /// Execute a tool call, converting every failure into a result.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        match self.registry.execute(call).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(&call.id, format!("Tool call failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codemate_core::error::ToolError;
    use codemate_core::tool::Tool;
    use codemate_github::{RepoContext, RepoSlug};

    fn test_client() -> Arc<GitHubClient> {
        Arc::new(GitHubClient::new(
            None,
            RepoContext::new(RepoSlug::new("octocat", "hello-world")),
        ))
    }

    #[test]
    fn default_registry_has_all_six_tools() {
        let registry = default_registry(test_client());
        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "get_file_contents",
                "get_repo_info",
                "list_all_files",
                "list_files",
                "search_code",
                "switch_repo",
            ]
        );
    }

    #[tokio::test]
    async fn invoker_unknown_tool_is_a_failure_result() {
        let invoker = ToolInvoker::new(Arc::new(default_registry(test_client())));
        let result = invoker
            .invoke(&ToolCall {
                id: "call_1".into(),
                name: "teleport".into(),
                arguments: serde_json::json!({}),
            })
            .await;
        assert!(!result.success);
        assert!(result.output.contains("Tool not found: teleport"));
        assert_eq!(result.call_id, "call_1");
    }

    struct ExplodingTool;

    #[async_trait]
    impl Tool for ExplodingTool {
        fn name(&self) -> &str {
            "exploding"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "exploding".into(),
                reason: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn invoker_converts_execution_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(ExplodingTool));
        let invoker = ToolInvoker::new(Arc::new(registry));

        let result = invoker
            .invoke(&ToolCall {
                id: "call_2".into(),
                name: "exploding".into(),
                arguments: serde_json::json!({}),
            })
            .await;
        assert!(!result.success);
        assert!(result.output.contains("boom"));
    }

    #[test]
    fn invoker_exposes_definitions() {
        let invoker = ToolInvoker::new(Arc::new(default_registry(test_client())));
        let defs = invoker.definitions();
        assert_eq!(defs.len(), 6);
        assert!(defs.iter().any(|d| d.name == SEARCH_CODE));
    }
}
