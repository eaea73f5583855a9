//! `codemate ask` — single question, streamed answer.

use codemate_agent::AskOptions;

use super::{build_agent, load_config, render_events};

pub async fn run(
    message: &str,
    debug: bool,
    show_raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let (agent, client) = build_agent(&config);

    tracing::debug!(repo = %client.current_repo().await, "Asking single question");

    let rx = agent.ask(
        message,
        Vec::new(),
        AskOptions {
            debug,
            show_raw_tool: show_raw,
        },
    );
    render_events(rx).await;

    Ok(())
}
