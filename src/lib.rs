// src/lib.rs
// Expose the download queue as a library for front ends

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod controller;
pub mod dependency_validator;
pub mod error;
pub mod fetcher;
pub mod options;
pub mod queue;
pub mod registry;
pub mod shell;
pub mod worker;

pub use controller::{DownloadController, StatusChange};
pub use error::AppError;
pub use fetcher::{MediaFetcher, YtDlpFetcher};
pub use options::{DownloadMode, FetchOptions};
pub use queue::QueueItem;

use crate::config::AppConfig;
use log::warn;
use std::sync::Arc;

/// Queue `urls`, download them all into `folder` and wait until every request settles.
///
/// Duplicate or blank urls are skipped with a warning. Returns the final list,
/// whose status text tells which downloads completed or failed.
pub async fn download_all(
    urls: &[String],
    folder: &str,
    mode: DownloadMode,
    fetcher: Arc<dyn MediaFetcher>,
    config: &AppConfig,
) -> Result<Vec<QueueItem>, AppError> {
    let mut controller = DownloadController::with_config(fetcher, config);
    controller.set_folder(folder);

    for url in urls {
        if let Err(e) = controller.add_to_list(url) {
            warn!("Skipping {}: {}", url, e);
        }
    }

    controller.start_download(mode)?;
    controller.wait_idle().await;
    Ok(controller.items().to_vec())
}
