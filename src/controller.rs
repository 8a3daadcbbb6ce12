// src/controller.rs
// Owns the download list and the request registry, and consumes worker events

use crate::config::AppConfig;
use crate::error::AppError;
use crate::fetcher::MediaFetcher;
use crate::options::DownloadMode;
use crate::queue::{strip_status, DownloadList, QueueItem};
use crate::registry::{RequestId, WorkerRegistry};
use crate::worker::{WorkRequest, WorkerEvent, WorkerPool, WorkerStatus};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub const STATUS_QUEUED: &str = "Queued";

/// Status changes a subscriber can fall behind by before it sees `Lagged`
pub const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Published every time a list entry's status changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub url: String,
    pub status: String,
    pub display: String,
    /// Complete, failed or cancelled
    pub finished: bool,
}

/// The queue/list controller.
///
/// This is the only owner of the list and the registry. Workers report back
/// through an mpsc channel and the controller applies their events in
/// `handle_event`, so no state is shared with worker tasks.
///
/// Status updates always go to the first list entry whose display text starts
/// with the reporting url. When several requests for one url are active they
/// all write to that entry and the last event received wins.
pub struct DownloadController {
    list: DownloadList,
    folder: String,
    registry: WorkerRegistry,
    pool: WorkerPool,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    status_tx: broadcast::Sender<StatusChange>,
}

impl DownloadController {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, max_concurrent: usize) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        Self {
            list: DownloadList::new(),
            folder: String::new(),
            registry: WorkerRegistry::new(),
            pool: WorkerPool::new(fetcher, max_concurrent, events_tx),
            events_rx,
            status_tx,
        }
    }

    pub fn with_config(fetcher: Arc<dyn MediaFetcher>, config: &AppConfig) -> Self {
        let mut controller = Self::new(fetcher, config.max_concurrent_downloads);
        controller.pool = controller.pool.with_audio(config.audio_settings());
        if let Some(folder) = &config.default_folder {
            controller.set_folder(folder.to_string_lossy());
        }
        controller
    }

    /// Receive every status change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.status_tx.subscribe()
    }

    pub fn set_folder(&mut self, folder: impl Into<String>) {
        self.folder = folder.into();
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn add_to_list(&mut self, url: &str) -> Result<(), AppError> {
        self.list.add(url)?;
        info!("Added {} to the list", url.trim());
        Ok(())
    }

    /// Remove the entries at `indices`. Running downloads for them keep going.
    pub fn remove_selected(&mut self, indices: &[usize]) -> Vec<QueueItem> {
        let removed = self.list.remove_selected(indices);
        for item in &removed {
            debug!("Removed {} from the list", item.url);
        }
        removed
    }

    /// Set the first entry matching `url` to `"{url} - {message}"`
    pub fn update_status(&mut self, url: &str, message: &str) {
        self.publish_status(url, message, false);
    }

    fn publish_status(&mut self, url: &str, message: &str, finished: bool) {
        let Some(index) = self.list.update_status(url, message) else {
            debug!("No list entry for {} (status {})", url, message);
            return;
        };

        if let Some(item) = self.list.get(index) {
            let _ = self.status_tx.send(StatusChange {
                url: url.to_string(),
                status: message.to_string(),
                display: item.display(),
                finished,
            });
        }
    }

    /// Queue every listed entry for download in `mode`.
    ///
    /// Entries are re-queued whatever their current status, and an entry that
    /// already has a request in flight gets a second one.
    pub fn start_download(&mut self, mode: DownloadMode) -> Result<Vec<RequestId>, AppError> {
        let folder = self.folder.trim().to_string();
        if folder.is_empty() {
            return Err(AppError::MissingFolder);
        }

        let urls: Vec<String> = self
            .list
            .displays()
            .iter()
            .map(|display| strip_status(display).to_string())
            .collect();

        let mut ids = Vec::with_capacity(urls.len());
        for url in urls {
            if self.registry.latest_active_for(&url).is_some() {
                warn!("{} already has a download in flight, starting another", url);
            }

            self.update_status(&url, STATUS_QUEUED);

            let (id, cancel) = self.registry.register(&url, mode);
            let request = WorkRequest {
                id: id.clone(),
                url: url.clone(),
                folder: PathBuf::from(&folder),
                mode,
                display_key: url,
            };
            let handle = self.pool.spawn(request, cancel);
            self.registry.attach_handle(&id, handle);
            ids.push(id);
        }

        info!("Queued {} {} download(s) into {}", ids.len(), mode, folder);
        Ok(ids)
    }

    /// Cancel every active request for `url`, returning how many were signalled
    pub fn cancel(&mut self, url: &str) -> usize {
        let cancelled = self.registry.cancel_url(url.trim());
        debug!("Cancelled {} request(s) for {}", cancelled, url);
        cancelled
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            info!("Cancelled {} active download(s)", cancelled);
        }
        cancelled
    }

    /// Forget failed requests
    pub fn clear_failed(&mut self) -> usize {
        self.registry.clear_failed()
    }

    /// Apply one worker event to the list and the registry
    pub fn handle_event(&mut self, event: WorkerEvent) {
        debug!("Handling worker event {:?}", event);

        match event {
            WorkerEvent::Status { id, key, status } => {
                match &status {
                    WorkerStatus::Downloading => self.registry.mark_downloading(&id),
                    WorkerStatus::Error(message) => self.registry.mark_failed(&id, message),
                    WorkerStatus::Cancelled => {
                        self.registry.remove(&id);
                    }
                    // The registry entry goes on `Completed`.
                    WorkerStatus::Complete => {}
                }
                self.publish_status(&key, &status.to_string(), status.is_terminal());
            }
            WorkerEvent::Completed { id, key } => match self.registry.complete(&id) {
                Some(entry) => {
                    let elapsed = Utc::now() - entry.spawned_at;
                    info!("{} finished in {}s", key, elapsed.num_seconds());
                }
                None => debug!("Completion for unknown request {} ({})", id, key),
            },
        }
    }

    /// Wait for one worker event and apply it
    pub async fn process_next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Process events until no request is queued or downloading
    pub async fn wait_idle(&mut self) {
        while self.registry.has_active() {
            if !self.process_next_event().await {
                break;
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.registry.has_active()
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn items(&self) -> &[QueueItem] {
        self.list.items()
    }

    pub fn displays(&self) -> Vec<String> {
        self.list.displays()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
