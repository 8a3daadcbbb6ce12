// tests/fetcher_test.rs
// yt-dlp argument rendering and process handling, using stand-in scripts instead of the real binary

use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ytdownloader::fetcher::{parse_destination_line, parse_error_line, YtdlpCommandBuilder};
use ytdownloader::options::{AudioSettings, DownloadMode, FetchOptions};
use ytdownloader::{AppError, MediaFetcher, YtDlpFetcher};

#[test]
fn test_download_mode_parsing() {
    assert_eq!("audio".parse::<DownloadMode>().unwrap(), DownloadMode::Audio);
    assert_eq!(" Video ".parse::<DownloadMode>().unwrap(), DownloadMode::Video);
    assert!("flac".parse::<DownloadMode>().is_err());
    assert_eq!(DownloadMode::Audio.to_string(), "audio");
}

#[test]
fn test_audio_options() {
    let options = FetchOptions::for_mode(Path::new("/tmp/out"), DownloadMode::Audio);
    assert_eq!(options.output_template, "/tmp/out/%(title)s.%(ext)s");
    assert_eq!(options.format_selector, "bestaudio/best");
    assert_eq!(options.post_processors.len(), 1);
    assert_eq!(options.post_processors[0].key, "FFmpegExtractAudio");
    assert_eq!(options.post_processors[0].preferred_codec, "mp3");
    assert_eq!(options.post_processors[0].preferred_quality, "192");
}

#[test]
fn test_custom_audio_settings() {
    let audio = AudioSettings {
        codec: "opus".to_string(),
        quality: "128".to_string(),
    };
    let options = FetchOptions::with_audio(Path::new("/tmp/out"), DownloadMode::Audio, &audio);
    let pp = options.audio_extraction().unwrap();
    assert_eq!(pp.preferred_codec, "opus");
    assert_eq!(pp.preferred_quality, "128");

    // Audio settings are ignored for video
    let options = FetchOptions::with_audio(Path::new("/tmp/out"), DownloadMode::Video, &audio);
    assert!(options.audio_extraction().is_none());
}

#[test]
fn test_ytdlp_command_builder_audio() {
    let options = FetchOptions::for_mode(Path::new("/music"), DownloadMode::Audio);
    let args = YtdlpCommandBuilder::new("https://example.com/video", &options).build_args();

    assert_eq!(
        args,
        vec![
            "-o",
            "/music/%(title)s.%(ext)s",
            "-f",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "192K",
            "--no-playlist",
            "--newline",
            "https://example.com/video",
        ]
    );
}

#[test]
fn test_ytdlp_command_builder_video_with_extras() {
    let options = FetchOptions::for_mode(Path::new("/videos"), DownloadMode::Video);
    let args = YtdlpCommandBuilder::new("https://example.com/video", &options)
        .with_playlist(true)
        .with_extra_args(["--cookies", "cookies.txt"])
        .build_args();

    assert!(args.contains(&"best".to_string()));
    assert!(args.contains(&"--yes-playlist".to_string()));
    assert!(!args.contains(&"--extract-audio".to_string()));
    // Extra arguments go in before the url, which stays last
    let cookies = args.iter().position(|a| a == "--cookies").unwrap();
    assert_eq!(args[cookies + 1], "cookies.txt");
    assert_eq!(args.last().map(String::as_str), Some("https://example.com/video"));
}

#[test]
fn test_parse_error_line() {
    assert_eq!(
        parse_error_line("ERROR: [youtube] abc: Video unavailable"),
        Some("[youtube] abc: Video unavailable")
    );
    assert_eq!(parse_error_line("WARNING: something"), None);
    assert_eq!(parse_error_line("ERROR:   "), None);
}

#[test]
fn test_parse_destination_line() {
    assert_eq!(
        parse_destination_line("[download] Destination: /tmp/out/Song.webm").as_deref(),
        Some("/tmp/out/Song.webm")
    );
    assert_eq!(
        parse_destination_line("[ExtractAudio] Destination: /tmp/out/Song.mp3").as_deref(),
        Some("/tmp/out/Song.mp3")
    );
    assert_eq!(
        parse_destination_line("[Merger] Merging formats into \"/tmp/out/Clip.mkv\"").as_deref(),
        Some("/tmp/out/Clip.mkv")
    );
    assert_eq!(parse_destination_line("[download]  42.0% of 3.00MiB"), None);
}

#[tokio::test]
async fn test_missing_program_is_reported() {
    let fetcher = YtDlpFetcher::new("/nonexistent/yt-dlp-for-tests");
    let options = FetchOptions::for_mode(Path::new("/tmp"), DownloadMode::Video);

    let result = fetcher
        .fetch("https://example.com/v1", &options, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AppError::MissingDependency(_))));
}

#[cfg(unix)]
fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-yt-dlp");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn test_error_line_becomes_fetch_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "echo 'WARNING: slow' >&2\necho 'ERROR: Video unavailable' >&2\nexit 1",
    );
    let fetcher = YtDlpFetcher::new(script);
    let options = FetchOptions::for_mode(dir.path(), DownloadMode::Video);

    let result = fetcher
        .fetch("https://example.com/v1", &options, CancellationToken::new())
        .await;
    match result {
        Err(AppError::Fetch(message)) => assert_eq!(message, "Video unavailable"),
        other => panic!("Expected fetch error, got {:?}", other),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_exit_code_without_error_line() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "exit 2");
    let fetcher = YtDlpFetcher::new(script);
    let options = FetchOptions::for_mode(dir.path(), DownloadMode::Audio);

    let result = fetcher
        .fetch("https://example.com/v1", &options, CancellationToken::new())
        .await;
    match result {
        Err(AppError::Fetch(message)) => assert_eq!(message, "yt-dlp exited with code 2"),
        other => panic!("Expected fetch error, got {:?}", other),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_successful_run() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "echo '[download] Destination: out.mp4'\nexit 0");
    let fetcher = YtDlpFetcher::new(script);
    let options = FetchOptions::for_mode(dir.path(), DownloadMode::Video);

    let result = fetcher
        .fetch("https://example.com/v1", &options, CancellationToken::new())
        .await;
    assert!(result.is_ok());
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancellation_kills_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "sleep 30");
    let fetcher = YtDlpFetcher::new(script);
    let options = FetchOptions::for_mode(dir.path(), DownloadMode::Video);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        fetcher.fetch("https://example.com/v1", &options, cancel),
    )
    .await
    .expect("cancellation should end the fetch");
    assert!(matches!(result, Err(AppError::Cancelled)));
}
