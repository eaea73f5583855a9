//! Full file listing tool — every blob path in the repository tree.

use std::sync::Arc;

use async_trait::async_trait;
use codemate_core::error::ToolError;
use codemate_core::tool::{Tool, ToolResult};
use codemate_github::GitHubClient;

pub struct ListAllFilesTool {
    client: Arc<GitHubClient>,
}

impl ListAllFilesTool {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListAllFilesTool {
    fn name(&self) -> &str {
        "list_all_files"
    }

    fn description(&self) -> &str {
        "List every file in the repository (recursive)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let files = self
            .client
            .list_all_files()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "list_all_files".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(
            "",
            serde_json::json!({
                "count": files.len(),
                "files": files,
            }),
        ))
    }
}
