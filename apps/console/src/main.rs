use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{BalloonClient, DeleteOutcome, GifListController, Observable, UploadCoordinator};
use shared::domain::GifName;
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use console::{
    default_download_path, describe_current, describe_list, ConsoleInput, TerminalPrompt,
};

#[derive(Parser, Debug)]
#[command(name = "balloon", about = "Show, upload and delete GIFs on the LED balloon")]
struct Cli {
    /// Balloon server, e.g. http://blinken.local:5050
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live view with interactive commands (default)
    Watch,
    Current,
    List,
    Upload {
        path: PathBuf,
    },
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    Download {
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref());
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    let client = BalloonClient::with_timeout(&settings.server_url, settings.request_timeout)
        .with_context(|| format!("invalid server url {}", settings.server_url))?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            console::run_watch(client, &settings).await?;
        }
        Command::Current => {
            let current = client
                .current_gif()
                .await
                .context("failed to fetch the current GIF")?;
            println!("{}", describe_current(Some(&current)));
        }
        Command::List => {
            let gifs = client.list_gifs().await.context("failed to fetch the GIF list")?;
            println!("{}", describe_list(Some(gifs.as_slice())));
        }
        Command::Upload { path } => {
            let mut uploader = UploadCoordinator::new(client);
            if let Err(err) = uploader.select(&path) {
                eprintln!("{}", err.user_message());
                return Ok(ExitCode::FAILURE);
            }
            match uploader.upload().await {
                Ok(receipt) => println!("{}", receipt.user_message()),
                Err(err) => {
                    eprintln!("{}", err.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Delete { name, yes } => {
            let name = GifName::new(name);
            let controller = GifListController::new(
                client,
                Observable::new(),
                Arc::new(TerminalPrompt::new(ConsoleInput::stdin(), yes)),
            );
            match controller.delete(&name).await {
                DeleteOutcome::Deleted => println!("Deleted {name}"),
                DeleteOutcome::Declined => println!("Kept {name}"),
                DeleteOutcome::Failed(_) => return Ok(ExitCode::FAILURE),
            }
        }
        Command::Download { name, output } => {
            let name = GifName::new(name);
            let bytes = client
                .fetch_gif(&name)
                .await
                .with_context(|| format!("failed to download {name}"))?;
            let output = match output {
                Some(output) => output,
                None => default_download_path(&name)
                    .with_context(|| format!("cannot derive a file name from {name}, pass --output"))?,
            };
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved {name} to {} ({} bytes)", output.display(), bytes.len());
        }
    }

    Ok(ExitCode::SUCCESS)
}
