//! Code search tool — filename scan plus content search over the current
//! repository.

use std::sync::Arc;

use async_trait::async_trait;
use codemate_core::error::ToolError;
use codemate_core::tool::{Tool, ToolResult};
use codemate_github::GitHubClient;

pub struct SearchCodeTool {
    client: Arc<GitHubClient>,
}

impl SearchCodeTool {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Search for code patterns, functions, or text in the repository"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text or pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Optional path prefix to restrict the search"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let path = arguments["path"].as_str().unwrap_or("");

        let results = self
            .client
            .search_code(query, path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "search_code".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(
            "",
            serde_json::json!({
                "query": query,
                "path": path,
                "total_matches": results.total_count,
                "filename_matches": results.filename_matches,
                "content_matches": results.content_matches,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemate_github::{RepoContext, RepoSlug};

    fn tool() -> SearchCodeTool {
        SearchCodeTool::new(Arc::new(GitHubClient::new(
            None,
            RepoContext::new(RepoSlug::new("octocat", "hello-world")),
        )))
    }

    #[tokio::test]
    async fn missing_query_is_invalid_arguments() {
        let err = tool().execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn definition_requires_query() {
        let def = tool().to_definition();
        assert_eq!(def.name, "search_code");
        assert_eq!(def.parameters["required"][0], "query");
    }
}
