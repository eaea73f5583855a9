//! `codemate chat` — interactive conversation mode.

use std::io::Write as _;

use codemate_agent::AskOptions;
use codemate_core::message::Message;
use tokio::io::AsyncBufReadExt;

use super::{build_agent, load_config, render_events};

pub async fn run(debug: bool, show_raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let (agent, client) = build_agent(&config);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        codemate — repository chat mode       ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:       {}", config.model);
    println!("  Repository:  {}", client.current_repo().await);
    println!();
    println!("  Ask about the repository, e.g. 'find the average function bug'.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let options = AskOptions {
        debug,
        show_raw_tool: show_raw,
    };
    let mut history: Vec<Message> = Vec::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        println!();
        let rx = agent.ask(line.as_str(), history.clone(), options);
        if let Some(answer) = render_events(rx).await {
            history.push(Message::user(line.as_str()));
            history.push(Message::assistant(answer));
        }

        println!();
        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
