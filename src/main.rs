//! Line-based chat front-end.
//!
//! Reads one user message per line from stdin and prints the assistant's
//! reply. `/tools` lists the available tools, `/new` starts a fresh
//! conversation, `/quit` exits.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use mcp_orchestrator::agent_core::TurnEvent;
use mcp_orchestrator::commands::ChatSession;
use mcp_orchestrator::config::load_config;
use mcp_orchestrator::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "mcp-orchestrator", version, about = "Chat with a model that can call remote tools")]
struct Cli {
    /// Config file (defaults: $MCP_ORCHESTRATOR_CONFIG, ./mcp-orchestrator.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    message: Option<String>,

    /// Abort a turn that takes longer than this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    config.logging.json |= cli.json_logs;
    init_tracing(&config.logging).context("failed to initialize logging")?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut session = ChatSession::from_config_with_events(&config, Some(events_tx))
        .context("failed to build chat session")?;
    if let Some(secs) = cli.deadline_secs {
        session = session.with_turn_deadline(Duration::from_secs(secs));
    }
    tokio::spawn(print_progress(events_rx));

    let info = session.start().await.context("failed to start chat session")?;
    println!(
        "Connected ({:?}) with {} tool(s). Conversation {}",
        info.status, info.tool_count, info.conversation_id
    );

    if let Some(message) = cli.message {
        println!("{}", session.send_message(&message).await);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/tools" => {
                let summary = session.tools_summary();
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            "/new" => {
                let info = session.start().await?;
                println!("New conversation {}", info.conversation_id);
            }
            text => {
                let reply = session.send_message(text).await;
                println!("{reply}");
            }
        }
    }

    session.end();
    Ok(())
}

/// Print tool activity while a turn runs.
async fn print_progress(mut events: mpsc::UnboundedReceiver<TurnEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TurnEvent::ToolsRequested { tool_names, .. } => {
                eprintln!("Executing tools: {}", tool_names.join(", "));
            }
            TurnEvent::ToolResults { results, .. } => {
                for result in results {
                    match result.error() {
                        Some(error) => eprintln!("  {} failed: {error}", result.name),
                        None => eprintln!("  {} done", result.name),
                    }
                }
            }
            TurnEvent::StateChanged { .. } => {}
        }
    }
}
