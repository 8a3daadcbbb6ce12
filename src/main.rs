// src/main.rs

use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use ytdownloader::cli::build_cli;
use ytdownloader::config::AppConfig;
use ytdownloader::dependency_validator::validate_dependencies;
use ytdownloader::shell::run_shell;
use ytdownloader::{
    AppError, DownloadController, DownloadMode, MediaFetcher, StatusChange, YtDlpFetcher, VERSION,
};

// Import env_logger for initialization
use env_logger::Builder;
use log::LevelFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize the logger with a custom format
    init_logger();
    info!("ytdownloader starting up - version {}", VERSION);

    let matches = build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = AppConfig::load(config_path.as_deref())?;
    if let Some(jobs) = matches.get_one::<u16>("jobs") {
        config.max_concurrent_downloads = usize::from(*jobs);
    }
    if let Some(ytdlp) = matches.get_one::<String>("ytdlp") {
        config.ytdlp_path = ytdlp.clone();
    }
    if let Some(folder) = matches.get_one::<String>("folder") {
        config.default_folder = Some(PathBuf::from(folder));
    }
    debug!("Effective config: {:?}", config);

    if !matches.get_flag("skip-checks") {
        match validate_dependencies(&config.ytdlp_path) {
            Ok(deps) => {
                if !deps.contains_key("ffmpeg") {
                    println!(
                        "{}",
                        "ffmpeg not found: audio downloads will fail to convert to mp3.".yellow()
                    );
                }
            }
            Err(e) => {
                error!("Dependency validation failed: {}", e);
                eprintln!("{}: {}", "Error".red(), e);
                eprintln!("{}", "Install yt-dlp or point --ytdlp at it.".yellow());
                return Err(e);
            }
        }
    }

    let fetcher: Arc<dyn MediaFetcher> = Arc::new(
        YtDlpFetcher::new(&config.ytdlp_path).with_extra_args(config.extra_ytdlp_args.clone()),
    );
    let mut controller = DownloadController::with_config(fetcher, &config);

    match matches.subcommand() {
        Some(("shell", _)) => run_shell(&mut controller).await,
        _ => {
            let urls: Vec<String> = matches
                .get_many::<String>("url")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            let mode = if matches.get_flag("audio") {
                DownloadMode::Audio
            } else {
                DownloadMode::Video
            };
            run_batch(&mut controller, &urls, mode).await
        }
    }
}

fn spinner_for<'a>(
    progress: &MultiProgress,
    style: &ProgressStyle,
    bars: &'a mut HashMap<String, ProgressBar>,
    url: &str,
) -> &'a ProgressBar {
    bars.entry(url.to_string()).or_insert_with(|| {
        let bar = progress.add(ProgressBar::new_spinner());
        bar.set_style(style.clone());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    })
}

fn show_status(
    progress: &MultiProgress,
    style: &ProgressStyle,
    bars: &mut HashMap<String, ProgressBar>,
    change: StatusChange,
) {
    let bar = spinner_for(progress, style, bars, &change.url);
    if bar.is_finished() {
        return;
    }

    if !change.finished {
        bar.set_message(change.display);
        return;
    }

    let status = if change.status == "Complete" {
        change.status.green()
    } else if change.status == "Cancelled" {
        change.status.yellow()
    } else {
        change.status.red()
    };
    bar.finish_with_message(format!("{} - {}", change.url, status));
}

/// Queue the urls given on the command line, download them all and wait
async fn run_batch(
    controller: &mut DownloadController,
    urls: &[String],
    mode: DownloadMode,
) -> Result<(), AppError> {
    for url in urls {
        if let Err(e) = controller.add_to_list(url) {
            warn!("Skipping {}: {}", url, e);
            println!("{}: {}", "Skipped".yellow(), e);
        }
    }

    let mut status_rx = controller.subscribe();
    let progress = MultiProgress::new();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .map_err(|e| AppError::General(e.to_string()))?;
    let mut bars = HashMap::new();
    for item in controller.items() {
        spinner_for(&progress, &style, &mut bars, &item.url).set_message(item.display());
    }

    if let Err(e) = controller.start_download(mode) {
        eprintln!("{}: {}", "Error".red(), e);
        return Err(e);
    }

    loop {
        loop {
            match status_rx.try_recv() {
                Ok(change) => show_status(&progress, &style, &mut bars, change),
                Err(TryRecvError::Lagged(n)) => {
                    // Missed changes are still reflected in the list itself
                    debug!("Skipped {} status updates, refreshing from the list", n);
                    for item in controller.items() {
                        let bar = spinner_for(&progress, &style, &mut bars, &item.url);
                        if !bar.is_finished() {
                            bar.set_message(item.display());
                        }
                    }
                }
                Err(_) => break,
            }
        }

        if controller.is_idle() {
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                let cancelled = controller.cancel_all();
                warn!("Interrupted, cancelling {} download(s)", cancelled);
            }
            processed = controller.process_next_event() => {
                if !processed {
                    break;
                }
            }
        }
    }

    for item in controller.items() {
        let bar = spinner_for(&progress, &style, &mut bars, &item.url);
        if !bar.is_finished() {
            bar.finish_with_message(item.display());
        }
    }

    let total = controller.len();
    let failed = controller
        .items()
        .iter()
        .filter(|item| item.status.starts_with("Error"))
        .count();

    if failed > 0 {
        return Err(AppError::General(format!(
            "{} of {} download(s) failed",
            failed, total
        )));
    }

    println!("{}", format!("{} download(s) finished.", total).green());
    Ok(())
}

/// Initialize the logger with a custom format and configuration
fn init_logger() {
    // Create a custom logger builder
    let mut builder = Builder::from_default_env();

    // Set the default level based on debug/release mode
    if cfg!(debug_assertions) {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.filter_level(LevelFilter::Info);
    }

    // Define a custom format with timestamp, level, module, and message
    builder.format(|buf, record| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(
            buf,
            "[{} {} {}] {}",
            timestamp,
            record.level().to_string().to_uppercase(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    // Allow override through RUST_LOG environment variable
    builder.parse_env("RUST_LOG");

    builder.init();
}
