// tests/common/mod.rs
// A fetch service stand-in that records calls and writes stub output files

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ytdownloader::controller::StatusChange;
use ytdownloader::{AppError, DownloadController, FetchOptions, MediaFetcher};

#[derive(Default)]
pub struct MockFetcher {
    calls: Mutex<Vec<(String, FetchOptions)>>,
    failures: HashMap<String, String>,
    delay: Duration,
    block_until_cancelled: bool,
    panic_on: Option<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail downloads of `url` with `message`
    pub fn failing(mut self, url: &str, message: &str) -> Self {
        self.failures.insert(url.to_string(), message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Never finish on its own; only cancellation ends a fetch
    pub fn blocking(mut self) -> Self {
        self.block_until_cancelled = true;
        self
    }

    /// Panic inside `fetch` for `url`
    pub fn panicking(mut self, url: &str) -> Self {
        self.panic_on = Some(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, FetchOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn stub_title(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("video")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        cancel: CancellationToken,
    ) -> Result<(), AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        if self.panic_on.as_deref() == Some(url) {
            panic!("mock fetcher panicked for {}", url);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = if self.block_until_cancelled {
            cancel.cancelled().await;
            Err(AppError::Cancelled)
        } else {
            tokio::select! {
                _ = cancel.cancelled() => Err(AppError::Cancelled),
                _ = tokio::time::sleep(self.delay) => Ok(()),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome?;

        if let Some(message) = self.failures.get(url) {
            return Err(AppError::Fetch(message.clone()));
        }

        let ext = options
            .audio_extraction()
            .map(|pp| pp.preferred_codec.clone())
            .unwrap_or_else(|| "mp4".to_string());
        let path = options
            .output_template
            .replace("%(title)s", &stub_title(url))
            .replace("%(ext)s", &ext);
        std::fs::write(path, b"stub")?;
        Ok(())
    }
}

pub fn controller_with(fetcher: Arc<MockFetcher>, max_concurrent: usize) -> DownloadController {
    DownloadController::new(fetcher, max_concurrent)
}

/// Process events until idle, failing the test if that takes too long
pub async fn settle(controller: &mut DownloadController) {
    tokio::time::timeout(Duration::from_secs(10), controller.wait_idle())
        .await
        .expect("downloads did not settle in time");
}

/// Status strings published for `url`, in order
pub fn statuses_for(rx: &mut tokio::sync::broadcast::Receiver<StatusChange>, url: &str) -> Vec<String> {
    let mut statuses = Vec::new();
    while let Ok(change) = rx.try_recv() {
        if change.url == url {
            statuses.push(change.status);
        }
    }
    statuses
}
