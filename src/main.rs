use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod events;
mod format;
mod markdown;
mod pipeline;
mod store;
mod suggestions;
mod ui;
mod voice;

use api::{ApiClient, Backend, TranscriptPayload};
use config::Config;
use ui::ChatApp;

#[derive(Parser)]
#[command(name = "counsel")]
#[command(version = "0.1.0")]
#[command(about = "Terminal client for the counsel answering service", long_about = None)]
struct Cli {
    /// Override the answering service URL from the config file
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the session transcript without opening the chat view
    Export {
        /// Where to write the document; defaults to the download directory
        output: Option<PathBuf>,
    },
}

/// Logs go to a file under the counsel home so the alternate screen stays
/// clean while the TUI owns the terminal.
fn init_tracing(config: &Config) -> Result<()> {
    let log_file = fs::File::create(config.log_path())
        .context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

async fn export_transcript(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let client = ApiClient::new(&config.base_url, config.request_timeout());

    match client.download_transcript().await? {
        TranscriptPayload::Report(message) => {
            println!("{}", message);
        }
        TranscriptPayload::Document(bytes) => {
            let target = output
                .unwrap_or_else(|| config.download_dir().join(pipeline::TRANSCRIPT_FILE_NAME));
            fs::write(&target, bytes)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            println!("Saved transcript to {}", target.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    init_tracing(&config)?;

    match cli.command {
        None => ChatApp::new(&config).run().await,
        Some(Commands::Export { output }) => export_transcript(&config, output).await,
    }
}
