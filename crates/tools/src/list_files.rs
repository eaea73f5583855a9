//! Directory listing tool.

use std::sync::Arc;

use async_trait::async_trait;
use codemate_core::error::ToolError;
use codemate_core::tool::{Tool, ToolResult};
use codemate_github::GitHubClient;

pub struct ListFilesTool {
    client: Arc<GitHubClient>,
}

impl ListFilesTool {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List all files in a directory"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the repository root (default: root)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");

        let files = self
            .client
            .list_files(path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "list_files".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(
            "",
            serde_json::json!({
                "path": path,
                "files": files,
            }),
        ))
    }
}
