// src/cli.rs

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the command-line interface for the application
pub fn build_cli() -> Command {
    Command::new("ytdownloader")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Queue YouTube URLs and download them as video or mp3 audio")
        .subcommand_negates_reqs(true)
        .subcommand(
            Command::new("shell")
                .about("Interactive queue: add, remove, download and cancel from a prompt"),
        )
        .arg(
            Arg::new("url")
                .help("One or more URLs to queue")
                .required(true)
                .num_args(1..)
                .index(1),
        )
        .arg(
            Arg::new("folder")
                .long("folder")
                .short('o')
                .help("Folder the downloads are saved to")
                .value_name("DIRECTORY")
                .global(true),
        )
        .arg(
            Arg::new("audio")
                .long("audio")
                .short('a')
                .help("Extract audio as mp3 instead of downloading video")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .help("Maximum number of simultaneous downloads")
                .value_name("N")
                .value_parser(value_parser!(u16).range(1..=64))
                .global(true),
        )
        .arg(
            Arg::new("ytdlp")
                .long("ytdlp")
                .help("Path to the yt-dlp executable")
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Read settings from this JSON file instead of the default location")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("skip-checks")
                .long("skip-checks")
                .help("Do not verify yt-dlp and ffmpeg before starting")
                .action(ArgAction::SetTrue)
                .global(true),
        )
}
