// src/registry.rs
// Tracks in-flight download requests by id, with a secondary index by url

use crate::options::DownloadMode;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Unique identifier of one spawned download request
pub type RequestId = String;

/// Where a registered request currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// Waiting for a worker slot
    Queued,
    Downloading,
    /// Fetch failed; kept until `clear_failed`
    Failed,
}

/// One registered request
#[derive(Debug)]
pub struct WorkerEntry {
    pub id: RequestId,
    pub url: String,
    pub mode: DownloadMode,
    pub state: WorkerState,
    pub spawned_at: DateTime<Utc>,
    pub error_message: Option<String>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WorkerEntry {
    /// Queued or downloading
    pub fn is_active(&self) -> bool {
        matches!(self.state, WorkerState::Queued | WorkerState::Downloading)
    }

    pub fn is_failed(&self) -> bool {
        self.state == WorkerState::Failed
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Whether the worker task has exited (true when no handle was attached)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

/// Generate a unique request id
pub fn generate_request_id() -> RequestId {
    use rand::Rng;
    let timestamp = chrono::Utc::now().timestamp_millis();
    let random = rand::thread_rng().gen::<u32>();
    format!("dl_{}_{}", timestamp, random)
}

/// Request table owned by the controller.
///
/// Entries leave the table when their worker completes or is cancelled.
/// Failed entries stay until `clear_failed` is called.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    entries: HashMap<RequestId, WorkerEntry>,
    /// url -> request ids, oldest first
    by_url: HashMap<String, Vec<RequestId>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new queued request for `url` and return its id and cancellation token.
    ///
    /// Existing requests for the same url are left untouched.
    pub fn register(&mut self, url: &str, mode: DownloadMode) -> (RequestId, CancellationToken) {
        let mut id = generate_request_id();
        while self.entries.contains_key(&id) {
            id = generate_request_id();
        }

        let cancel_token = CancellationToken::new();
        self.entries.insert(
            id.clone(),
            WorkerEntry {
                id: id.clone(),
                url: url.to_string(),
                mode,
                state: WorkerState::Queued,
                spawned_at: Utc::now(),
                error_message: None,
                cancel_token: cancel_token.clone(),
                handle: None,
            },
        );
        self.by_url
            .entry(url.to_string())
            .or_default()
            .push(id.clone());

        debug!("Registered request {} for {}", id, url);
        (id, cancel_token)
    }

    pub fn attach_handle(&mut self, id: &str, handle: JoinHandle<()>) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.handle = Some(handle);
        }
    }

    pub fn mark_downloading(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.state = WorkerState::Downloading;
        }
    }

    pub fn mark_failed(&mut self, id: &str, message: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.state = WorkerState::Failed;
            entry.error_message = Some(message.to_string());
        }
    }

    /// Drop a request after its worker finished successfully
    pub fn complete(&mut self, id: &str) -> Option<WorkerEntry> {
        self.remove(id)
    }

    /// Drop a request from both indexes
    pub fn remove(&mut self, id: &str) -> Option<WorkerEntry> {
        let entry = self.entries.remove(id)?;
        if let Some(ids) = self.by_url.get_mut(&entry.url) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.by_url.remove(&entry.url);
            }
        }
        Some(entry)
    }

    /// Fire the cancellation token of every active request for `url`
    pub fn cancel_url(&self, url: &str) -> usize {
        let mut cancelled = 0;
        for id in self.ids_for(url) {
            if let Some(entry) = self.entries.get(&id).filter(|entry| entry.is_active()) {
                entry.cancel_token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for entry in self.entries.values().filter(|entry| entry.is_active()) {
            entry.cancel_token.cancel();
            cancelled += 1;
        }
        cancelled
    }

    /// Remove every failed request, returning how many were dropped
    pub fn clear_failed(&mut self) -> usize {
        let failed: Vec<RequestId> = self
            .entries
            .values()
            .filter(|entry| entry.is_failed())
            .map(|entry| entry.id.clone())
            .collect();

        for id in &failed {
            self.remove(id);
        }
        failed.len()
    }

    pub fn get(&self, id: &str) -> Option<&WorkerEntry> {
        self.entries.get(id)
    }

    /// Request ids registered for `url`, oldest first
    pub fn ids_for(&self, url: &str) -> Vec<RequestId> {
        self.by_url.get(url).cloned().unwrap_or_default()
    }

    /// Most recently spawned request for `url` that is still active
    pub fn latest_active_for(&self, url: &str) -> Option<&WorkerEntry> {
        self.by_url
            .get(url)?
            .iter()
            .rev()
            .filter_map(|id| self.entries.get(id))
            .find(|entry| entry.is_active())
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WorkerEntry> {
        self.entries.values()
    }

    pub fn active_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_active()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_failed()).count()
    }

    pub fn has_active(&self) -> bool {
        self.entries.values().any(WorkerEntry::is_active)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
