mod config;
mod conversation;
mod error;
mod events;
mod llm;
mod prompts;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::conversation::ConversationController;
use crate::events::AppEvent;
use crate::llm::LlmClient;
use crate::ui::conversation::{ConversationAction, ConversationManager};
use crate::ui::tui::{self, EventHandler, Tui};

#[derive(Parser)]
#[command(name = "askansh")]
#[command(version)]
#[command(about = "Ask an AI assistant about Anshumansinh Rathore", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.askansh/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model identifier to request
    #[arg(short, long)]
    model: Option<String>,

    /// Log file (defaults to ~/.askansh/askansh.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Log to a file so output never lands on the terminal UI
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("askansh=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

async fn run(terminal: &mut Tui, mut manager: ConversationManager, mut events: EventHandler) -> Result<()> {
    loop {
        terminal
            .draw(|frame| frame.render_widget(&manager, frame.size()))
            .context("Failed to draw frame")?;

        let Some(event) = events.next().await else {
            break;
        };

        match event {
            AppEvent::Key(key) => {
                if manager.handle_key(key) == ConversationAction::Exit {
                    break;
                }
            }
            AppEvent::Paste(text) => {
                if manager.handle_paste(&text) == ConversationAction::Exit {
                    break;
                }
            }
            AppEvent::Resize => {}
            AppEvent::Tick => manager.on_tick(),
            AppEvent::ReplySettled(outcome) => manager.on_reply(outcome),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(model) = cli.model {
        config.model = model;
    }

    let log_path = cli.log_file.unwrap_or_else(|| config.log_path());
    init_logging(&log_path)?;

    // Fail before taking over the terminal if the key is missing
    let client = LlmClient::new(&config)?;
    let controller = ConversationController::new(config.system_prompt());
    info!(session = %controller.session_id(), model = %client.model(), "starting chat session");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let events = EventHandler::new();
    let manager = ConversationManager::new(controller, Arc::new(client), events.sender());
    let result = run(&mut terminal, manager, events).await;

    let restored = tui::restore();
    info!("chat session ended");
    first_error(result, restored)
}

/// The loop's error wins over a failure to restore the terminal
fn first_error(result: Result<()>, restored: Result<()>) -> Result<()> {
    result.and(restored)
}
