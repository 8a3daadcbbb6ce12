// src/fetcher.rs
// The media fetch service seam and its yt-dlp implementation

use crate::error::AppError;
use crate::options::FetchOptions;
use async_trait::async_trait;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_YTDLP: &str = "yt-dlp";

static DESTINATION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?:download|ExtractAudio|Merger)\]\s+(?:Destination:\s+|Merging formats into\s+)(.+)$")
        .expect("destination pattern is valid")
});

/// External collaborator that downloads (and optionally transcodes) one url.
///
/// Implementations block the calling task until the output is on disk, and
/// return `AppError::Cancelled` when `cancel` fires mid-download.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        cancel: CancellationToken,
    ) -> Result<(), AppError>;
}

/// Renders a url plus fetch options into yt-dlp arguments
#[derive(Debug, Clone)]
pub struct YtdlpCommandBuilder {
    url: String,
    options: FetchOptions,
    playlist: bool,
    extra_args: Vec<String>,
}

impl YtdlpCommandBuilder {
    pub fn new(url: &str, options: &FetchOptions) -> Self {
        Self {
            url: url.to_string(),
            options: options.clone(),
            playlist: false,
            extra_args: Vec::new(),
        }
    }

    pub fn with_playlist(mut self, playlist: bool) -> Self {
        self.playlist = playlist;
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            self.options.output_template.clone(),
            "-f".to_string(),
            self.options.format_selector.clone(),
        ];

        if let Some(pp) = self.options.audio_extraction() {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(pp.preferred_codec.clone());
            args.push("--audio-quality".to_string());
            args.push(format!("{}K", pp.preferred_quality));
        }

        if self.playlist {
            args.push("--yes-playlist".to_string());
        } else {
            args.push("--no-playlist".to_string());
        }

        args.push("--newline".to_string());
        args.extend(self.extra_args.iter().cloned());
        args.push(self.url.clone());
        args
    }

    pub fn build(&self, program: &Path) -> AsyncCommand {
        let mut command = AsyncCommand::new(program);
        command.args(self.build_args());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);
        command
    }
}

/// Runs the yt-dlp executable as a child process
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_YTDLP)
    }
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments appended to every invocation before the url
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Pull the message out of a yt-dlp `ERROR:` line
pub fn parse_error_line(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("ERROR:")
        .map(str::trim)
        .filter(|message| !message.is_empty())
}

/// Pull the output path out of a yt-dlp destination line
pub fn parse_destination_line(line: &str) -> Option<String> {
    DESTINATION_LINE
        .captures(line.trim())
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim_matches('"').to_string())
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        cancel: CancellationToken,
    ) -> Result<(), AppError> {
        let mut command = YtdlpCommandBuilder::new(url, options)
            .with_extra_args(self.extra_args.iter().cloned())
            .build(&self.program);
        debug!("Running {:?}", command);

        let mut child = command.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                AppError::MissingDependency(self.program.display().to_string())
            }
            _ => AppError::IoError(e),
        })?;

        let stdout_task = child.stdout.take().map(|stdout| {
            let url = url.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(path) = parse_destination_line(&line) {
                        info!("{} -> {}", url, path);
                    } else {
                        debug!("yt-dlp: {}", line);
                    }
                }
            })
        });

        let last_error = Arc::new(Mutex::new(None::<String>));
        let stderr_task = child.stderr.take().map(|stderr| {
            let last_error = Arc::clone(&last_error);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(message) = parse_error_line(&line) {
                        if let Ok(mut slot) = last_error.lock() {
                            *slot = Some(message.to_string());
                        }
                    } else {
                        warn!("yt-dlp: {}", line);
                    }
                }
            })
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                debug!("Killing yt-dlp for {}", url);
                let _ = child.kill().await;
                return Err(AppError::Cancelled);
            }
        };

        // Drain the readers so the last stderr line is captured before we report.
        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        if status.success() {
            return Ok(());
        }

        let message = last_error.lock().ok().and_then(|slot| slot.clone());
        Err(AppError::Fetch(message.unwrap_or_else(|| match status.code() {
            Some(code) => format!("yt-dlp exited with code {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        })))
    }
}
