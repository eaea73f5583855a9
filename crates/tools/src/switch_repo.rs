//! Repository switching tool.
//!
//! Mutates the shared repository context; the change is visible to every
//! subsequent tool invocation, across conversations.

use std::sync::Arc;

use async_trait::async_trait;
use codemate_core::error::ToolError;
use codemate_core::tool::{Tool, ToolResult};
use codemate_github::GitHubClient;

pub struct SwitchRepoTool {
    client: Arc<GitHubClient>,
}

impl SwitchRepoTool {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SwitchRepoTool {
    fn name(&self) -> &str {
        "switch_repo"
    }

    fn description(&self) -> &str {
        "Switch to a different GitHub repository"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "owner": {
                    "type": "string",
                    "description": "Repository owner (user or organization)"
                },
                "repo": {
                    "type": "string",
                    "description": "Repository name"
                }
            },
            "required": ["owner", "repo"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let owner = arguments["owner"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'owner' argument".into()))?;
        let repo = arguments["repo"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'repo' argument".into()))?;

        let message = self.client.switch_repo(owner, repo).await;

        Ok(ToolResult::ok(
            "",
            serde_json::json!({
                "message": message,
                "new_repo": format!("{owner}/{repo}"),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemate_github::{RepoContext, RepoSlug};

    fn tool() -> SwitchRepoTool {
        SwitchRepoTool::new(Arc::new(GitHubClient::new(
            None,
            RepoContext::new(RepoSlug::new("octocat", "hello-world")),
        )))
    }

    #[tokio::test]
    async fn switch_updates_shared_context() {
        let tool = tool();
        let result = tool
            .execute(serde_json::json!({"owner": "rust-lang", "repo": "cargo"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("rust-lang/cargo"));
        assert_eq!(tool.client.current_repo().await, "rust-lang/cargo");
    }

    #[tokio::test]
    async fn missing_owner_is_invalid_arguments() {
        let err = tool()
            .execute(serde_json::json!({"repo": "cargo"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
