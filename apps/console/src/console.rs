//! Interactive terminal front-end: live view of the balloon plus upload/delete commands.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use client_core::{
    BalloonClient, DeleteOutcome, GifListController, JsonEndpoint, PollingStateSync,
    UploadCoordinator, UserPrompt,
};
use shared::domain::GifName;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::Mutex,
};
use tracing::{info, warn};

use crate::config::Settings;

pub const HELP: &str = "\
commands:
  upload <path>   upload a GIF and play it
  delete <name>   delete a GIF from the balloon
  list            show the GIF list
  current         show what the screen is displaying
  refresh         poll the balloon right away
  help            show this help
  quit            leave";

/// Line reader over stdin shared by the command loop and confirmation prompts.
#[derive(Clone)]
pub struct ConsoleInput {
    lines: Arc<Mutex<Lines<BufReader<Stdin>>>>,
}

impl ConsoleInput {
    pub fn stdin() -> Self {
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines())),
        }
    }

    /// Next line, or `None` once stdin is closed.
    pub async fn read_line(&self) -> Option<String> {
        match self.lines.lock().await.next_line().await {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "console: failed to read stdin");
                None
            }
        }
    }
}

pub struct TerminalPrompt {
    input: ConsoleInput,
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(input: ConsoleInput, assume_yes: bool) -> Self {
        Self { input, assume_yes }
    }
}

#[async_trait]
impl UserPrompt for TerminalPrompt {
    async fn confirm_delete(&self, name: &GifName) -> bool {
        if self.assume_yes {
            return true;
        }
        if let Err(err) = write_delete_question(&mut io::stdout(), name) {
            warn!(error = %err, "console: failed to show confirmation prompt");
        }
        self.input
            .read_line()
            .await
            .is_some_and(|answer| is_affirmative(&answer))
    }

    async fn alert(&self, message: &str) {
        eprintln!("!! {message}");
    }
}

pub fn write_delete_question(out: &mut impl Write, name: &GifName) -> io::Result<()> {
    write!(out, "Delete {name}? [y/N] ")?;
    out.flush()
}

/// Where `download` saves a GIF when no output path is given: the last path component of
/// the name, inside the working directory.
pub fn default_download_path(name: &GifName) -> Option<PathBuf> {
    Path::new(name.as_str()).file_name().map(PathBuf::from)
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Upload(PathBuf),
    Delete(GifName),
    List,
    Current,
    Refresh,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ConsoleCommand {
    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, arg.trim()),
        None => (line, ""),
    };

    match (word.to_ascii_lowercase().as_str(), arg) {
        ("", _) => ConsoleCommand::Empty,
        ("upload" | "delete" | "rm", "") => {
            ConsoleCommand::Unknown(format!("{word} needs an argument"))
        }
        ("upload", path) => ConsoleCommand::Upload(PathBuf::from(path)),
        ("delete" | "rm", name) => ConsoleCommand::Delete(GifName::from(name)),
        ("list" | "ls", _) => ConsoleCommand::List,
        ("current", _) => ConsoleCommand::Current,
        ("refresh", _) => ConsoleCommand::Refresh,
        ("help" | "?", _) => ConsoleCommand::Help,
        ("quit" | "exit" | "q", _) => ConsoleCommand::Quit,
        _ => ConsoleCommand::Unknown(line.to_string()),
    }
}

/// `None` while the first poll is outstanding, `Some(None)` when nothing is playing.
pub fn describe_current(current: Option<&Option<GifName>>) -> String {
    match current {
        None => "Screen is currently displaying: Loading...".to_string(),
        Some(None) => "Screen is currently displaying: nothing".to_string(),
        Some(Some(name)) => format!("Screen is currently displaying: {name}"),
    }
}

pub fn describe_list(gifs: Option<&[GifName]>) -> String {
    match gifs {
        None => "GIFs: loading...".to_string(),
        Some([]) => "GIFs: none stored".to_string(),
        Some(gifs) => {
            let mut out = format!("GIFs ({}):", gifs.len());
            for (index, gif) in gifs.iter().enumerate() {
                out.push_str(&format!("\n  {:>2}. {gif}", index + 1));
            }
            out
        }
    }
}

struct Session {
    current: PollingStateSync<Option<GifName>>,
    list: PollingStateSync<Vec<GifName>>,
    controller: GifListController,
    uploader: UploadCoordinator,
}

impl Session {
    fn refresh(&self) {
        self.current.poll_now();
        self.list.poll_now();
    }

    async fn handle(&mut self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Upload(path) => {
                if let Err(err) = self.uploader.select(&path) {
                    println!("{}", err.user_message());
                    return;
                }
                println!("Uploading {}...", path.display());
                match self.uploader.upload().await {
                    Ok(receipt) => {
                        println!("{}", receipt.user_message());
                        self.refresh();
                    }
                    Err(err) => println!("{}", err.user_message()),
                }
            }
            ConsoleCommand::Delete(name) => match self.controller.delete(&name).await {
                DeleteOutcome::Deleted => {
                    println!("Deleted {name}");
                    println!("{}", describe_list(Some(self.controller.items().as_slice())));
                }
                DeleteOutcome::Declined => println!("Kept {name}"),
                DeleteOutcome::Failed(_) => {}
            },
            ConsoleCommand::List => {
                println!("{}", describe_list(self.list.current().as_deref()));
            }
            ConsoleCommand::Current => {
                println!("{}", describe_current(self.current.current().as_ref()));
            }
            ConsoleCommand::Refresh => self.refresh(),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Unknown(text) => {
                println!("Unknown command: {text}. Type 'help' for commands.");
            }
            ConsoleCommand::Quit | ConsoleCommand::Empty => {}
        }
    }

    fn stop(&self) {
        self.current.stop();
        self.list.stop();
    }
}

/// Polls the balloon and prints every change until `quit`, end of input or Ctrl-C.
pub async fn run_watch(client: BalloonClient, settings: &Settings) -> Result<()> {
    let input = ConsoleInput::stdin();
    let current = PollingStateSync::start(
        Arc::new(JsonEndpoint::current_gif(&client)),
        settings.current_poll,
    );
    let list = PollingStateSync::start(
        Arc::new(JsonEndpoint::gif_list(&client)),
        settings.list_poll,
    );
    let controller = GifListController::new(
        client.clone(),
        list.state().clone(),
        Arc::new(TerminalPrompt::new(input.clone(), false)),
    );
    let mut session = Session {
        current,
        list,
        controller,
        uploader: UploadCoordinator::new(client),
    };

    let mut current_rx = session.current.state().subscribe();
    let mut list_rx = session.list.state().subscribe();
    info!("watch: polling started");
    println!("{HELP}");
    println!("{}", describe_current(None));

    loop {
        tokio::select! {
            changed = current_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = describe_current(current_rx.borrow_and_update().as_ref());
                println!("{text}");
            }
            changed = list_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = describe_list(list_rx.borrow_and_update().as_deref());
                println!("{text}");
            }
            line = input.read_line() => {
                let Some(line) = line else {
                    break;
                };
                match parse_command(&line) {
                    ConsoleCommand::Quit => break,
                    command => session.handle(command).await,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.stop();
    info!("watch: polling stopped");
    Ok(())
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
