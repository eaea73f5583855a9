//! The shared "current repository" context.

use std::sync::Arc;

use codemate_config::GitHubConfig;
use tokio::sync::RwLock;

/// A repository coordinate: owner, name, and the branch used for tree
/// queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: "main".into(),
        }
    }

    /// Whether both owner and repo are set.
    pub fn is_configured(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// The process-wide current-repository value.
///
/// Shared across every tool invocation and every conversation; concurrent
/// switches race and the last write wins. Multi-tenant deployments would
/// carry one of these per conversation instead.
#[derive(Clone)]
pub struct RepoContext {
    inner: Arc<RwLock<RepoSlug>>,
}

impl RepoContext {
    pub fn new(slug: RepoSlug) -> Self {
        Self {
            inner: Arc::new(RwLock::new(slug)),
        }
    }

    /// Build the initial context from configuration.
    pub fn from_config(config: &GitHubConfig) -> Self {
        Self::new(RepoSlug {
            owner: config.owner.clone().unwrap_or_default(),
            repo: config.repo.clone().unwrap_or_default(),
            branch: config.branch.clone(),
        })
    }

    /// Snapshot the current repository coordinate.
    pub async fn current(&self) -> RepoSlug {
        self.inner.read().await.clone()
    }

    /// Point the context at a different repository. The branch resets to
    /// `main` — the new repository's layout is unknown.
    pub async fn switch(&self, owner: impl Into<String>, repo: impl Into<String>) -> RepoSlug {
        let slug = RepoSlug::new(owner, repo);
        *self.inner.write().await = slug.clone();
        slug
    }
}
