//! File read tool — fetch and decode one file from the repository.

use std::sync::Arc;

use async_trait::async_trait;
use codemate_core::error::ToolError;
use codemate_core::tool::{Tool, ToolResult};
use codemate_github::GitHubClient;

pub struct FileContentsTool {
    client: Arc<GitHubClient>,
}

impl FileContentsTool {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for FileContentsTool {
    fn name(&self) -> &str {
        "get_file_contents"
    }

    fn description(&self) -> &str {
        "Read the complete contents of a specific file"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let file = self
            .client
            .get_file_contents(path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "get_file_contents".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(
            "",
            serde_json::json!({
                "path": file.path,
                "content": file.content,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemate_github::{RepoContext, RepoSlug};

    #[tokio::test]
    async fn missing_path_is_invalid_arguments() {
        let tool = FileContentsTool::new(Arc::new(GitHubClient::new(
            None,
            RepoContext::new(RepoSlug::new("octocat", "hello-world")),
        )));
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
