//! The GitHub REST client.
//!
//! Search combines two passes: a filename scan over the recursive git tree
//! (the contents API cannot match on names) and GitHub's code-search API for
//! file contents. Both passes degrade to empty results on failure so the
//! agent can keep the conversation going with whatever it got.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use codemate_core::error::GitHubError;
use codemate_core::event::{DomainEvent, EventBus};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{RepoContext, RepoSlug};

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = "codemate-agent";

/// A file whose name matched the search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilenameMatch {
    pub path: String,
    pub name: String,
    pub url: String,
}

/// A file whose contents matched the search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMatch {
    pub name: String,
    pub path: String,
}

/// Combined output of a repository code search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub filename_matches: Vec<FilenameMatch>,
    pub content_matches: Vec<ContentMatch>,
    pub total_count: usize,
}

/// A decoded file fetched from the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContents {
    pub path: String,
    pub content: String,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The GitHub API client.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    context: RepoContext,
    events: Option<Arc<EventBus>>,
}

impl GitHubClient {
    pub fn new(token: Option<String>, context: RepoContext) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: GITHUB_API.into(),
            token,
            context,
            events: None,
        }
    }

    /// Point the client at a different API host (tests, GitHub Enterprise).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Publish `RepoSwitched` events on this bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// The shared repository context this client operates on.
    pub fn context(&self) -> &RepoContext {
        &self.context
    }

    /// The "owner/repo" identifier of the current repository.
    pub async fn current_repo(&self) -> String {
        self.context.current().await.to_string()
    }

    /// Switch to a different repository. Returns a status message.
    pub async fn switch_repo(&self, owner: &str, repo: &str) -> String {
        let slug = self.context.switch(owner, repo).await;
        if let Some(events) = &self.events {
            events.publish(DomainEvent::RepoSwitched {
                owner: slug.owner.clone(),
                repo: slug.repo.clone(),
                timestamp: chrono::Utc::now(),
            });
        }
        debug!(repo = %slug, "Switched repository");
        format!("Switched to repository: {slug}")
    }

    async fn slug(&self) -> Result<RepoSlug, GitHubError> {
        let slug = self.context.current().await;
        if !slug.is_configured() {
            return Err(GitHubError::NoRepository);
        }
        Ok(slug)
    }

    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, GitHubError> {
        let mut req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
            .query(params);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("token {token}"));
        }

        let response = req
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let message = response.text().await.unwrap_or_default();
            return Err(GitHubError::ApiError {
                status_code: status,
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))
    }

    /// Search the current repository: filename scan plus content search.
    pub async fn search_code(
        &self,
        query: &str,
        path: &str,
    ) -> Result<SearchResults, GitHubError> {
        let slug = self.slug().await?;

        let filename_matches = match self.get_file_tree(&slug).await {
            Ok(tree) => filename_matches(&tree, query, path, &slug),
            Err(e) => {
                warn!(error = %e, "Filename scan failed, continuing with content search only");
                Vec::new()
            }
        };

        let content_matches = match self.search_code_content(query, path, &slug).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Content search failed");
                Vec::new()
            }
        };

        let total_count = filename_matches.len() + content_matches.len();
        Ok(SearchResults {
            filename_matches,
            content_matches,
            total_count,
        })
    }

    async fn search_code_content(
        &self,
        query: &str,
        path: &str,
        slug: &RepoSlug,
    ) -> Result<Vec<ContentMatch>, GitHubError> {
        let q = build_search_query(query, slug, path);
        let url = format!("{}/search/code", self.base_url);
        let body = self.get_json(&url, &[("q", &q)]).await?;

        let items = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(ContentMatch {
                            name: item["name"].as_str()?.to_string(),
                            path: item["path"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(items)
    }

    /// Fetch and decode the contents of a file.
    pub async fn get_file_contents(&self, path: &str) -> Result<FileContents, GitHubError> {
        let slug = self.slug().await?;
        let url = format!("{}/repos/{}/{}/contents/{}", self.base_url, slug.owner, slug.repo, path);
        let body = self.get_json(&url, &[]).await?;

        if body["type"].as_str() != Some("file") {
            return Err(GitHubError::NotAFile(path.to_string()));
        }

        let encoded = body["content"].as_str().unwrap_or_default();
        let content = decode_blob(encoded).map_err(|reason| GitHubError::DecodeFailed {
            path: path.to_string(),
            reason,
        })?;

        Ok(FileContents {
            path: path.to_string(),
            content,
        })
    }

    /// List the entries of a directory (`"."` or `""` for the root).
    pub async fn list_files(&self, path: &str) -> Result<Vec<DirEntry>, GitHubError> {
        let slug = self.slug().await?;
        let path = if path == "." { "" } else { path };
        let url = format!("{}/repos/{}/{}/contents/{}", self.base_url, slug.owner, slug.repo, path);
        let body = self.get_json(&url, &[]).await?;

        let entries = body
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(DirEntry {
                            name: item["name"].as_str()?.to_string(),
                            path: item["path"].as_str()?.to_string(),
                            kind: item["type"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(entries)
    }

    /// Fetch metadata for the current repository.
    pub async fn get_repo_info(&self) -> Result<serde_json::Value, GitHubError> {
        let slug = self.slug().await?;
        let url = format!("{}/repos/{}/{}", self.base_url, slug.owner, slug.repo);
        self.get_json(&url, &[]).await
    }

    /// Fetch the recursive git tree of the current branch.
    async fn get_file_tree(&self, slug: &RepoSlug) -> Result<Vec<TreeEntry>, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}",
            self.base_url, slug.owner, slug.repo, slug.branch
        );
        let body = self.get_json(&url, &[("recursive", "1")]).await?;

        let entries = body["tree"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(TreeEntry {
                            path: item["path"].as_str()?.to_string(),
                            kind: item["type"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(entries)
    }

    /// Every blob path in the repository.
    pub async fn list_all_files(&self) -> Result<Vec<String>, GitHubError> {
        let slug = self.slug().await?;
        let tree = self.get_file_tree(&slug).await?;
        Ok(tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| e.path)
            .collect())
    }

    /// List repository names for an owner (user first, then org).
    pub async fn list_repos_for_owner(
        &self,
        owner: Option<&str>,
    ) -> Result<Vec<String>, GitHubError> {
        let current = self.context.current().await;
        let owner = match owner {
            Some(o) => o.to_string(),
            None if !current.owner.is_empty() => current.owner.clone(),
            None => return Ok(Vec::new()),
        };

        let urls = [
            format!("{}/users/{}/repos", self.base_url, owner),
            format!("{}/orgs/{}/repos", self.base_url, owner),
        ];

        let mut names = Vec::new();
        for url in &urls {
            match self.get_json(url, &[("per_page", "100")]).await {
                Ok(body) => {
                    if let Some(items) = body.as_array() {
                        names.extend(
                            items
                                .iter()
                                .filter_map(|item| item["name"].as_str().map(String::from)),
                        );
                        break;
                    }
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Owner repo listing attempt failed");
                    continue;
                }
            }
        }

        Ok(dedupe_preserving_order(names))
    }
}

/// One entry of a recursive git tree.
#[derive(Debug, Clone)]
pub(crate) struct TreeEntry {
    pub path: String,
    pub kind: String,
}

/// Scan tree blobs for basenames containing the query (case-insensitive),
/// optionally restricted to paths containing `path_filter`.
pub(crate) fn filename_matches(
    tree: &[TreeEntry],
    query: &str,
    path_filter: &str,
    slug: &RepoSlug,
) -> Vec<FilenameMatch> {
    let needle = query.to_lowercase();
    tree.iter()
        .filter(|entry| entry.kind == "blob")
        .filter_map(|entry| {
            let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
            if !name.to_lowercase().contains(&needle) {
                return None;
            }
            if !path_filter.is_empty() && !entry.path.contains(path_filter) {
                return None;
            }
            Some(FilenameMatch {
                path: entry.path.clone(),
                name: name.to_string(),
                url: format!(
                    "https://github.com/{}/{}/blob/{}/{}",
                    slug.owner, slug.repo, slug.branch, entry.path
                ),
            })
        })
        .collect()
}

/// Build a code-search query scoped to the repository and optional path.
pub(crate) fn build_search_query(query: &str, slug: &RepoSlug, path: &str) -> String {
    let mut q = format!("{query} repo:{}/{}", slug.owner, slug.repo);
    if !path.is_empty() {
        q.push_str(&format!(" path:{path}"));
    }
    q
}

/// Decode a base64 blob body (the API wraps lines with newlines).
pub(crate) fn decode_blob(encoded: &str) -> Result<String, String> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| e.to_string())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// De-duplicate while preserving first-seen order.
pub(crate) fn dedupe_preserving_order(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
