// src/queue.rs
// The ordered download list and its display strings

use crate::error::AppError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator between the url and its status in the display text
pub const STATUS_SEPARATOR: &str = " - ";

/// A single url entry in the download list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// URL the entry was added (or last updated) with
    pub url: String,
    /// Current status message, empty until a download is triggered
    pub status: String,
}

impl QueueItem {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: String::new(),
        }
    }

    /// Text shown in the list: the bare url, or `"{url} - {status}"`
    pub fn display(&self) -> String {
        if self.status.is_empty() {
            self.url.clone()
        } else {
            format!("{}{}{}", self.url, STATUS_SEPARATOR, self.status)
        }
    }
}

/// Recover the bare url from a display text by dropping everything after the first separator
pub fn strip_status(display: &str) -> &str {
    display
        .split(STATUS_SEPARATOR)
        .next()
        .unwrap_or(display)
}

/// Ordered list of queued urls. Insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct DownloadList {
    items: Vec<QueueItem>,
}

impl DownloadList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a url with an empty status.
    ///
    /// The input is trimmed first. A url counts as a duplicate when any existing
    /// display text starts with it, so `https://a/v1` is rejected once
    /// `https://a/v10` is listed, but not the other way round.
    pub fn add(&mut self, url: &str) -> Result<(), AppError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::EmptyInput);
        }

        if self.items.iter().any(|item| item.display().starts_with(url)) {
            debug!("Rejecting duplicate url {}", url);
            return Err(AppError::Duplicate(url.to_string()));
        }

        self.items.push(QueueItem::new(url));
        Ok(())
    }

    /// Remove the items at the given display indices.
    ///
    /// Indices are deduplicated and removed from the highest down so earlier
    /// removals never shift later ones. Out-of-range indices are ignored.
    pub fn remove_selected(&mut self, indices: &[usize]) -> Vec<QueueItem> {
        let selected: BTreeSet<usize> = indices.iter().copied().collect();
        let mut removed = Vec::with_capacity(selected.len());

        for index in selected.into_iter().rev() {
            if index < self.items.len() {
                removed.push(self.items.remove(index));
            }
        }

        removed.reverse();
        removed
    }

    /// Rewrite the first entry whose display text starts with `url` to `"{url} - {message}"`.
    ///
    /// Returns the index of the updated entry. Later matches are left alone.
    pub fn update_status(&mut self, url: &str, message: &str) -> Option<usize> {
        let index = self
            .items
            .iter()
            .position(|item| item.display().starts_with(url))?;

        let item = &mut self.items[index];
        // The whole display text is replaced, so the entry takes the matched url.
        item.url = url.to_string();
        item.status = message.to_string();
        Some(index)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn displays(&self) -> Vec<String> {
        self.items.iter().map(QueueItem::display).collect()
    }

    /// Bare urls of every entry, in display order
    pub fn urls(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| strip_status(&item.display()).to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
