//! Dependency validator
//!
//! Locates the external programs the fetch service relies on (yt-dlp for
//! downloads, ffmpeg for audio extraction) and checks their versions against
//! known minimums before any download is queued.

use crate::error::AppError;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::process::Command;

// Minimum acceptable versions for dependencies
pub const MIN_YTDLP_VERSION: &str = "2023.07.06";
pub const MIN_FFMPEG_VERSION: &str = "4.0.0";

#[derive(Debug, Clone)]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
    pub path: String,
    pub is_min_version: bool,
}

fn version_flag(name: &str) -> &'static str {
    if name.ends_with("ffmpeg") {
        "-version"
    } else {
        "--version"
    }
}

static FFMPEG_VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"ffmpeg version n?(\d+\.\d+(?:\.\d+)?)").expect("version pattern is valid"),
        Regex::new(r"version\s+(?:[^\d]*?)(\d+\.\d+(?:\.\d+)?)").expect("version pattern is valid"),
    ]
});

static YTDLP_VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(\d{4}\.\d{2}\.\d{2}(?:\.\d+)?)").expect("version pattern is valid"),
        Regex::new(r"(\d+\.\d+\.\d+)").expect("version pattern is valid"),
    ]
});

/// Parse version information from a program's version output
pub fn parse_version(output: &str, name: &str) -> Option<String> {
    let patterns = if name.ends_with("ffmpeg") {
        &FFMPEG_VERSION_PATTERNS
    } else {
        &YTDLP_VERSION_PATTERNS
    };

    let version = patterns
        .iter()
        .find_map(|re| re.captures(output).and_then(|c| c.get(1)))
        .map(|version| version.as_str().trim().to_string());

    if version.is_none() {
        debug!("Unparseable version output for {}: {}", name, output);
    }
    version
}

/// Compare dotted versions numerically, first three components
pub fn is_minimum_version(version: &str, min_version: &str) -> bool {
    let version_parts: Vec<u32> = version.split('.').filter_map(|s| s.parse().ok()).collect();
    let min_parts: Vec<u32> = min_version.split('.').filter_map(|s| s.parse().ok()).collect();

    for i in 0..3 {
        let v1 = version_parts.get(i).copied().unwrap_or(0);
        let v2 = min_parts.get(i).copied().unwrap_or(0);
        if v1 > v2 {
            return true;
        }
        if v1 < v2 {
            return false;
        }
    }
    true
}

/// Run `program --version` (or `-version` for ffmpeg) and collect what it reports
pub fn get_dependency_info(program: &str) -> Result<DependencyInfo, AppError> {
    let output = Command::new(program)
        .arg(version_flag(program))
        .output()
        .map_err(|_| AppError::MissingDependency(program.to_string()))?;

    if !output.status.success() {
        return Err(AppError::MissingDependency(program.to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&stdout, program).unwrap_or_else(|| "unknown".to_string());
    let min_version = if program.ends_with("ffmpeg") {
        MIN_FFMPEG_VERSION
    } else {
        MIN_YTDLP_VERSION
    };
    let is_min_version = version == "unknown" || is_minimum_version(&version, min_version);

    Ok(DependencyInfo {
        name: program.to_string(),
        version,
        path: program.to_string(),
        is_min_version,
    })
}

/// Check yt-dlp (required) and ffmpeg (needed for audio extraction).
///
/// A missing yt-dlp is an error. Old versions and a missing ffmpeg only warn.
pub fn validate_dependencies(ytdlp: &str) -> Result<HashMap<String, DependencyInfo>, AppError> {
    let mut results = HashMap::new();

    info!("Starting dependency validation");
    let ytdlp_info = get_dependency_info(ytdlp)?;
    if !ytdlp_info.is_min_version {
        warn!(
            "yt-dlp version {} is below minimum required ({})",
            ytdlp_info.version, MIN_YTDLP_VERSION
        );
    }
    results.insert("yt-dlp".to_string(), ytdlp_info);

    match get_dependency_info("ffmpeg") {
        Ok(info) => {
            if !info.is_min_version {
                warn!(
                    "ffmpeg version {} is below minimum recommended ({})",
                    info.version, MIN_FFMPEG_VERSION
                );
            }
            results.insert("ffmpeg".to_string(), info);
        }
        Err(_) => {
            warn!("ffmpeg not found; audio extraction will fail");
        }
    }

    Ok(results)
}
