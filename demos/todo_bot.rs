//! Todo Bot Example
//!
//! This example demonstrates how to:
//! - Load an adaptive dialog from a declarative `.dialog` file
//! - Drive it turn by turn through a `DialogManager`
//! - Keep user memory across cancelled conversations
//!
//! Run with `--interactive` to chat on stdin instead of the scripted turns.
//! Set `RUST_LOG=adaptive_dialog=debug` to watch the plan being edited.

use adaptive_dialog::{Activity, ComponentRegistry, DialogManager, MemoryStorage};
use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const TODO_BOT: &str = include_str!("todo_bot.dialog");

const SCRIPT: [&str; 10] = [
    "hello",
    "add milk",
    "add eggs",
    "show",
    "remove milk",
    "clear",
    "help",
    "no",
    "stop",
    "show",
];

async fn turn(manager: &DialogManager, text: &str) -> anyhow::Result<()> {
    let activity = Activity::message(text).with_conversation("console", "demo", "alice");
    let outcome = manager
        .on_turn(activity)
        .await
        .with_context(|| format!("turn '{text}' failed"))?;
    for response in &outcome.responses {
        println!("   bot> {}", response.text_or_empty());
    }
    println!("   [{:?}]\n", outcome.status);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Adaptive Dialog Todo Bot ===\n");

    let registry = ComponentRegistry::with_builtins();
    let dialog = registry
        .load_dialog(TODO_BOT)
        .context("todo_bot.dialog is invalid")?;
    let manager = DialogManager::new(Arc::new(dialog), Arc::new(MemoryStorage::new()));

    if std::env::args().any(|arg| arg == "--interactive") {
        println!("Type a message, or an empty line to quit.\n");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            if text.is_empty() {
                break;
            }
            turn(&manager, text).await?;
        }
        return Ok(());
    }

    for (step, text) in SCRIPT.iter().enumerate() {
        println!("{}. user> {text}", step + 1);
        turn(&manager, text).await?;
    }

    println!("=== Example completed successfully! ===");
    Ok(())
}
