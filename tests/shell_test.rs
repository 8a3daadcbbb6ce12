// tests/shell_test.rs
mod common;

use common::{controller_with, settle, MockFetcher};
use std::sync::Arc;
use ytdownloader::shell::{execute, parse_command, ShellCommand};
use ytdownloader::{AppError, DownloadMode};

#[test]
fn test_parse_commands() {
    assert_eq!(
        parse_command("add https://example.com/v1").unwrap(),
        ShellCommand::Add("https://example.com/v1".to_string())
    );
    assert_eq!(parse_command("remove 2 0").unwrap(), ShellCommand::Remove(vec![2, 0]));
    assert_eq!(parse_command("rm").unwrap(), ShellCommand::Remove(vec![]));
    assert_eq!(
        parse_command("folder /tmp/out dir").unwrap(),
        ShellCommand::Folder(Some("/tmp/out dir".to_string()))
    );
    assert_eq!(parse_command("folder").unwrap(), ShellCommand::Folder(None));
    assert_eq!(parse_command("AUDIO").unwrap(), ShellCommand::Download(DownloadMode::Audio));
    assert_eq!(
        parse_command("download video").unwrap(),
        ShellCommand::Download(DownloadMode::Video)
    );
    assert_eq!(parse_command("cancel all").unwrap(), ShellCommand::Cancel(None));
    assert_eq!(
        parse_command("cancel https://example.com/v1").unwrap(),
        ShellCommand::Cancel(Some("https://example.com/v1".to_string()))
    );
    assert_eq!(parse_command("   ").unwrap(), ShellCommand::Empty);
    assert_eq!(parse_command("quit").unwrap(), ShellCommand::Quit);
}

#[test]
fn test_parse_rejects_bad_input() {
    assert!(matches!(parse_command("remove one"), Err(AppError::ValidationError(_))));
    assert!(matches!(parse_command("cancel"), Err(AppError::ValidationError(_))));
    assert!(matches!(parse_command("download flac"), Err(AppError::ValidationError(_))));
    assert!(matches!(parse_command("frobnicate"), Err(AppError::ValidationError(_))));
}

#[test]
fn test_execute_list_editing() {
    let mut controller = controller_with(Arc::new(MockFetcher::new()), 2);

    assert!(execute(&mut controller, ShellCommand::Add("https://example.com/a".into())).unwrap());
    assert!(execute(&mut controller, ShellCommand::Add("https://example.com/b".into())).unwrap());
    let duplicate = execute(&mut controller, ShellCommand::Add("https://example.com/a".into()));
    assert!(matches!(duplicate, Err(ref e) if e.is_input_error()));

    execute(&mut controller, ShellCommand::Remove(vec![0])).unwrap();
    assert_eq!(controller.displays(), vec!["https://example.com/b".to_string()]);

    execute(&mut controller, ShellCommand::Folder(Some("/tmp/out".into()))).unwrap();
    assert_eq!(controller.folder(), "/tmp/out");

    assert!(!execute(&mut controller, ShellCommand::Quit).unwrap());
}

#[test]
fn test_execute_download_without_folder() {
    let mut controller = controller_with(Arc::new(MockFetcher::new()), 2);
    execute(&mut controller, ShellCommand::Add("https://example.com/a".into())).unwrap();

    let result = execute(&mut controller, ShellCommand::Download(DownloadMode::Video));
    assert!(matches!(result, Err(AppError::MissingFolder)));
}

#[tokio::test]
async fn test_execute_download_and_clear_failed() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new().failing("https://example.com/a", "nope"));
    let mut controller = controller_with(fetcher, 2);
    execute(&mut controller, ShellCommand::Add("https://example.com/a".into())).unwrap();
    execute(
        &mut controller,
        ShellCommand::Folder(Some(dir.path().to_string_lossy().into_owned())),
    )
    .unwrap();

    execute(&mut controller, ShellCommand::Download(DownloadMode::Audio)).unwrap();
    settle(&mut controller).await;
    assert_eq!(controller.displays(), vec!["https://example.com/a - Error: nope".to_string()]);
    assert_eq!(controller.registry().failed_count(), 1);

    execute(&mut controller, ShellCommand::ClearFailed).unwrap();
    assert!(controller.registry().is_empty());
}
