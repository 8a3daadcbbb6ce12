// src/shell.rs
// Interactive front end: one command per line, mirroring the list buttons

use crate::controller::{DownloadController, StatusChange};
use crate::error::AppError;
use crate::options::DownloadMode;
use colored::*;
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

pub const HELP: &str = "\
Commands:
  add <url>            add a URL to the list
  remove <i> [j ...]   remove entries by index (as shown by list)
  folder [dir]         show or set the download folder
  video | audio        download every listed entry
  cancel <url>|all     cancel running downloads
  clear-failed         forget failed downloads
  list                 show the list
  help                 show this help
  quit                 exit (running downloads are abandoned)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Remove(Vec<usize>),
    Folder(Option<String>),
    Download(DownloadMode),
    Cancel(Option<String>),
    ClearFailed,
    List,
    Help,
    Quit,
    Empty,
}

/// Parse one input line
pub fn parse_command(line: &str) -> Result<ShellCommand, AppError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Ok(ShellCommand::Empty),
        "add" => Ok(ShellCommand::Add(rest.to_string())),
        "remove" | "rm" => {
            let indices = rest
                .split_whitespace()
                .map(|part| {
                    part.parse::<usize>().map_err(|_| {
                        AppError::ValidationError(format!("'{}' is not a list index", part))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ShellCommand::Remove(indices))
        }
        "folder" | "browse" => Ok(ShellCommand::Folder(
            Some(rest.to_string()).filter(|dir| !dir.is_empty()),
        )),
        "video" => Ok(ShellCommand::Download(DownloadMode::Video)),
        "audio" => Ok(ShellCommand::Download(DownloadMode::Audio)),
        "download" => Ok(ShellCommand::Download(rest.parse()?)),
        "cancel" => match rest {
            "" => Err(AppError::ValidationError(
                "cancel needs a URL or 'all'".to_string(),
            )),
            "all" => Ok(ShellCommand::Cancel(None)),
            url => Ok(ShellCommand::Cancel(Some(url.to_string()))),
        },
        "clear-failed" => Ok(ShellCommand::ClearFailed),
        "list" | "ls" => Ok(ShellCommand::List),
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" | "q" => Ok(ShellCommand::Quit),
        other => Err(AppError::ValidationError(format!(
            "Unknown command '{}', type help",
            other
        ))),
    }
}

fn print_list(controller: &DownloadController) {
    if controller.is_empty() {
        println!("{}", "(list is empty)".dimmed());
        return;
    }
    for (index, display) in controller.displays().iter().enumerate() {
        println!("{:>3}  {}", index, display);
    }
}

pub fn print_status(change: &StatusChange) {
    let status = if change.status.starts_with("Error") {
        change.status.red()
    } else if change.status == "Complete" {
        change.status.green()
    } else if change.status == "Cancelled" {
        change.status.yellow()
    } else {
        change.status.cyan()
    };
    println!("{} - {}", change.url, status);
}

/// Apply one command. Returns false when the shell should exit.
pub fn execute(controller: &mut DownloadController, command: ShellCommand) -> Result<bool, AppError> {
    match command {
        ShellCommand::Empty => {}
        ShellCommand::Add(url) => controller.add_to_list(&url)?,
        ShellCommand::Remove(indices) => {
            let removed = controller.remove_selected(&indices);
            println!("Removed {} entr{}", removed.len(), if removed.len() == 1 { "y" } else { "ies" });
        }
        ShellCommand::Folder(Some(dir)) => controller.set_folder(dir),
        ShellCommand::Folder(None) => match controller.folder() {
            "" => println!("{}", "No folder selected".yellow()),
            folder => println!("{}", folder),
        },
        ShellCommand::Download(mode) => {
            let ids = controller.start_download(mode)?;
            debug!("Started requests {:?}", ids);
        }
        ShellCommand::Cancel(Some(url)) => {
            let n = controller.cancel(&url);
            println!("Cancelling {} download(s)", n);
        }
        ShellCommand::Cancel(None) => {
            let n = controller.cancel_all();
            println!("Cancelling {} download(s)", n);
        }
        ShellCommand::ClearFailed => {
            let n = controller.clear_failed();
            println!("Forgot {} failed download(s)", n);
        }
        ShellCommand::List => print_list(controller),
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => return Ok(false),
    }
    Ok(true)
}

/// Read commands from stdin while applying worker events as they arrive
pub async fn run_shell(controller: &mut DownloadController) -> Result<(), AppError> {
    let mut status_rx = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", "Type help for commands".dimmed());
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line).and_then(|command| execute(controller, command)) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) if e.is_input_error() => println!("{}", e.to_string().yellow()),
                    Err(e) => println!("{}: {}", "Error".red(), e),
                }
            }
            processed = controller.process_next_event() => {
                if !processed {
                    break;
                }
            }
            change = status_rx.recv() => {
                match change {
                    Ok(change) => print_status(&change),
                    Err(broadcast::error::RecvError::Lagged(n)) => debug!("Skipped {} status lines", n),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    let abandoned = controller.cancel_all();
    if abandoned > 0 {
        println!("Abandoning {} running download(s)", abandoned);
    }
    Ok(())
}
