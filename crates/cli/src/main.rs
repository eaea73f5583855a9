//! codemate CLI — the main entry point.
//!
//! Commands:
//! - `chat`  — Interactive conversation about the configured repository
//! - `ask`   — Single question, streamed answer
//! - `repos` — List repositories for an owner

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "codemate",
    about = "codemate — chat with a GitHub repository from your terminal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation about the configured repository
    Chat {
        /// Show raw tool payloads alongside previews
        #[arg(long)]
        show_raw: bool,
    },

    /// Ask a single question and stream the answer
    Ask {
        /// The question to ask
        #[arg(short, long)]
        message: String,

        /// Show raw tool payloads alongside previews
        #[arg(long)]
        show_raw: bool,
    },

    /// List repositories for an owner (defaults to the configured owner)
    Repos {
        /// Owner (user or organization) to list
        #[arg(short, long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { show_raw } => commands::chat::run(cli.verbose, show_raw).await?,
        Commands::Ask { message, show_raw } => {
            commands::ask::run(&message, cli.verbose, show_raw).await?
        }
        Commands::Repos { owner } => commands::repos::run(owner.as_deref()).await?,
    }

    Ok(())
}
