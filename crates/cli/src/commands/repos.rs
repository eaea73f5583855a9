//! `codemate repos` — list repositories for an owner.

use std::sync::Arc;

use codemate_config::AppConfig;
use codemate_github::{GitHubClient, RepoContext};

pub async fn run(owner: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    // No model API key needed here; only GitHub is touched
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let context = RepoContext::from_config(&config.github);
    let client = Arc::new(GitHubClient::new(config.github.token.clone(), context));

    let names = client.list_repos_for_owner(owner).await?;

    if names.is_empty() {
        println!("No repositories found (is an owner configured or passed via --owner?).");
        return Ok(());
    }

    for name in names {
        println!("{name}");
    }

    Ok(())
}
