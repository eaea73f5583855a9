//! GitHub repository client for codemate.
//!
//! This is the external collaborator behind the agent's tools: code search,
//! file reads, directory listings, repository metadata, and repository
//! switching, all over the GitHub REST API.
//!
//! The "current repository" is process-wide shared state by design (a
//! single-operator demo semantics): it is carried as an explicit
//! [`RepoContext`] value threaded into the client rather than ambient global
//! state, so per-conversation isolation stays a small change if it is ever
//! needed.

pub mod client;
pub mod context;

pub use client::{ContentMatch, DirEntry, FileContents, FilenameMatch, GitHubClient, SearchResults};
pub use context::{RepoContext, RepoSlug};
