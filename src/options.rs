// src/options.rs
// Fetch options derived from a download mode

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Output file name template, relative to the target folder
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

pub const VIDEO_FORMAT: &str = "best";
pub const AUDIO_FORMAT: &str = "bestaudio/best";
pub const EXTRACT_AUDIO_KEY: &str = "FFmpegExtractAudio";

pub const DEFAULT_AUDIO_CODEC: &str = "mp3";
pub const DEFAULT_AUDIO_QUALITY: &str = "192";

/// What to produce from a url
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    Video,
    Audio,
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadMode::Video => write!(f, "video"),
            DownloadMode::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for DownloadMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(DownloadMode::Video),
            "audio" => Ok(DownloadMode::Audio),
            other => Err(AppError::ValidationError(format!(
                "Unknown download mode '{}', expected video or audio",
                other
            ))),
        }
    }
}

/// Target codec and quality for audio extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub codec: String,
    pub quality: String,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: DEFAULT_AUDIO_CODEC.to_string(),
            quality: DEFAULT_AUDIO_QUALITY.to_string(),
        }
    }
}

/// A post-processing step run by the fetch service after the download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessor {
    pub key: String,
    pub preferred_codec: String,
    pub preferred_quality: String,
}

/// Options handed to the media fetch service along with the url
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    pub output_template: String,
    pub format_selector: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_processors: Vec<PostProcessor>,
}

impl FetchOptions {
    /// Build the options for `mode` with the default mp3/192 audio settings
    pub fn for_mode(folder: &Path, mode: DownloadMode) -> Self {
        Self::with_audio(folder, mode, &AudioSettings::default())
    }

    pub fn with_audio(folder: &Path, mode: DownloadMode, audio: &AudioSettings) -> Self {
        let output_template = folder.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned();

        match mode {
            DownloadMode::Audio => Self {
                output_template,
                format_selector: AUDIO_FORMAT.to_string(),
                post_processors: vec![PostProcessor {
                    key: EXTRACT_AUDIO_KEY.to_string(),
                    preferred_codec: audio.codec.clone(),
                    preferred_quality: audio.quality.clone(),
                }],
            },
            DownloadMode::Video => Self {
                output_template,
                format_selector: VIDEO_FORMAT.to_string(),
                post_processors: Vec::new(),
            },
        }
    }

    /// The audio extraction step, if any
    pub fn audio_extraction(&self) -> Option<&PostProcessor> {
        self.post_processors
            .iter()
            .find(|pp| pp.key == EXTRACT_AUDIO_KEY)
    }
}
