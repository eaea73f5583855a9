//! CLI subcommands.

pub mod ask;
pub mod chat;
pub mod repos;

use std::io::Write as _;
use std::sync::Arc;

use codemate_agent::{AgentEvent, AgentLoop};
use codemate_config::AppConfig;
use codemate_core::event::EventBus;
use codemate_github::{GitHubClient, RepoContext};
use codemate_tools::ToolInvoker;
use tokio::sync::mpsc;

/// Load config, insisting on an API key with clear setup guidance.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GROQ_API_KEY=gsk_...       (recommended)");
        eprintln!("    CODEMATE_API_KEY=...       (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!(
            "    {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}

/// Wire the agent loop and its collaborators from configuration.
pub fn build_agent(config: &AppConfig) -> (AgentLoop, Arc<GitHubClient>) {
    let event_bus = Arc::new(EventBus::default());
    let context = RepoContext::from_config(&config.github);
    let client = Arc::new(
        GitHubClient::new(config.github.token.clone(), context.clone())
            .with_events(event_bus.clone()),
    );

    let registry = Arc::new(codemate_tools::default_registry(client.clone()));
    let invoker = Arc::new(ToolInvoker::new(registry));
    let provider = Arc::new(codemate_providers::build_from_config(config));

    let agent = AgentLoop::new(provider, &config.model, invoker, context, event_bus)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_limits(&config.agent);

    (agent, client)
}

/// Render one event stream to the terminal; returns the final answer text.
pub async fn render_events(mut rx: mpsc::Receiver<AgentEvent>) -> Option<String> {
    let mut streamed = String::new();
    let mut final_text = None;

    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::Chunk { text } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
                streamed.push_str(&text);
            }
            AgentEvent::Reasoning { text } => {
                println!();
                println!("  [reasoning] {text}");
            }
            AgentEvent::ToolCall { tool, args } => {
                println!();
                println!("  [tool] {tool}({args})");
            }
            AgentEvent::ToolResult { tool, preview, raw } => {
                println!("  [tool] {tool} -> {preview}");
                if let Some(raw) = raw {
                    let pretty =
                        serde_json::to_string_pretty(&raw).unwrap_or_else(|_| raw.to_string());
                    println!("  [raw] {pretty}");
                }
            }
            AgentEvent::Final { text } => {
                final_text = Some(text);
            }
        }
    }

    match &final_text {
        // A tool-path or diagnostic final was never streamed; print it
        Some(text) if text.trim() != streamed.trim() => {
            println!();
            println!("{text}");
        }
        Some(_) => println!(),
        None => {
            println!();
            eprintln!("  [error] The agent stopped without a final answer.");
        }
    }

    final_text
}
