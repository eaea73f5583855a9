//! Repository metadata tool.

use std::sync::Arc;

use async_trait::async_trait;
use codemate_core::error::ToolError;
use codemate_core::tool::{Tool, ToolResult};
use codemate_github::GitHubClient;

pub struct RepoInfoTool {
    client: Arc<GitHubClient>,
}

impl RepoInfoTool {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for RepoInfoTool {
    fn name(&self) -> &str {
        "get_repo_info"
    }

    fn description(&self) -> &str {
        "Get repository metadata and statistics"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let info = self
            .client
            .get_repo_info()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "get_repo_info".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok("", serde_json::json!({ "repo_info": info })))
    }
}
