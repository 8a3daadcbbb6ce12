// src/worker.rs
// Download workers and the bounded pool that runs them

use crate::error::AppError;
use crate::fetcher::MediaFetcher;
use crate::options::{AudioSettings, DownloadMode, FetchOptions};
use crate::registry::RequestId;
use log::{debug, error, info};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default number of downloads allowed to run at once
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Immutable input to one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkRequest {
    pub id: RequestId,
    pub url: String,
    pub folder: PathBuf,
    pub mode: DownloadMode,
    /// List entry the worker reports against
    pub display_key: String,
}

/// Status a worker reports for its list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkerStatus {
    Downloading,
    Complete,
    Error(String),
    Cancelled,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerStatus::Downloading)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Downloading => write!(f, "Downloading..."),
            WorkerStatus::Complete => write!(f, "Complete"),
            WorkerStatus::Error(message) => write!(f, "Error: {}", message),
            WorkerStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Message sent from a worker to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkerEvent {
    Status {
        id: RequestId,
        key: String,
        status: WorkerStatus,
    },
    /// Sent after `Complete`, only on success
    Completed { id: RequestId, key: String },
}

fn send_status(events: &mpsc::UnboundedSender<WorkerEvent>, request: &WorkRequest, status: WorkerStatus) {
    let _ = events.send(WorkerEvent::Status {
        id: request.id.clone(),
        key: request.display_key.clone(),
        status,
    });
}

/// Run one request to completion.
///
/// Emits `Downloading...` first, then exactly one of `Complete` (followed by
/// `Completed`), `Error: {message}` or `Cancelled`.
pub async fn run_worker(
    request: WorkRequest,
    fetcher: Arc<dyn MediaFetcher>,
    audio: AudioSettings,
    events: mpsc::UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
) {
    send_status(&events, &request, WorkerStatus::Downloading);

    let options = FetchOptions::with_audio(&request.folder, request.mode, &audio);
    debug!("Fetching {} with {:?}", request.url, options);

    // A panicking fetcher comes back as a JoinError
    let url = request.url.clone();
    let fetch = tokio::spawn(async move { fetcher.fetch(&url, &options, cancel).await });
    let outcome = match fetch.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(AppError::Fetch("download task panicked".to_string())),
        Err(e) => Err(AppError::Fetch(e.to_string())),
    };

    match outcome {
        Ok(()) => {
            info!("Download {} completed successfully", request.id);
            send_status(&events, &request, WorkerStatus::Complete);
            let _ = events.send(WorkerEvent::Completed {
                id: request.id.clone(),
                key: request.display_key.clone(),
            });
        }
        Err(AppError::Cancelled) => {
            info!("Download {} cancelled", request.id);
            send_status(&events, &request, WorkerStatus::Cancelled);
        }
        Err(e) => {
            error!("Download {} failed: {}", request.id, e);
            send_status(&events, &request, WorkerStatus::Error(e.to_string()));
        }
    }
}

/// Runs workers with at most `max_concurrent` fetches in flight.
///
/// Each request gets its own task; the task waits for a semaphore slot before
/// it reports `Downloading...`, so requests over the limit stay `Queued`.
pub struct WorkerPool {
    fetcher: Arc<dyn MediaFetcher>,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    audio: AudioSettings,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerPool {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        max_concurrent: usize,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            fetcher,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            audio: AudioSettings::default(),
            events,
        }
    }

    pub fn with_audio(mut self, audio: AudioSettings) -> Self {
        self.audio = audio;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Spawn a task for `request`. Must be called from within a tokio runtime.
    pub fn spawn(&self, request: WorkRequest, cancel: CancellationToken) -> JoinHandle<()> {
        let slots = Arc::clone(&self.slots);
        let fetcher = Arc::clone(&self.fetcher);
        let audio = self.audio.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Request {} cancelled while queued", request.id);
                    send_status(&events, &request, WorkerStatus::Cancelled);
                    return;
                }
                permit = slots.acquire_owned() => permit,
            };

            let _permit = match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Worker pool closed before {} could start: {}", request.id, e);
                    send_status(&events, &request, WorkerStatus::Error(e.to_string()));
                    return;
                }
            };

            run_worker(request, fetcher, audio, events, cancel).await;
        })
    }
}
