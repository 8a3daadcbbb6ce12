// src/config.rs
// User configuration loaded from a JSON file

use crate::error::AppError;
use crate::fetcher::DEFAULT_YTDLP;
use crate::options::{AudioSettings, DEFAULT_AUDIO_CODEC, DEFAULT_AUDIO_QUALITY};
use crate::worker::DEFAULT_MAX_CONCURRENT;
use dirs_next as dirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "ytdownloader";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upper bound on simultaneous downloads
    pub max_concurrent_downloads: usize,
    /// yt-dlp executable name or path
    pub ytdlp_path: String,
    /// Folder used when none is given on the command line
    pub default_folder: Option<PathBuf>,
    pub audio_codec: String,
    pub audio_quality: String,
    /// Extra arguments passed to every yt-dlp call
    pub extra_ytdlp_args: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT,
            ytdlp_path: DEFAULT_YTDLP.to_string(),
            default_folder: None,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_quality: DEFAULT_AUDIO_QUALITY.to_string(),
            extra_ytdlp_args: Vec::new(),
        }
    }
}

/// `{config_dir}/ytdownloader/config.json`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_DIR);
        path.push(CONFIG_FILE);
        path
    })
}

impl AppConfig {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => {
                    debug!("No config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        let config: AppConfig = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_concurrent_downloads == 0 {
            return Err(AppError::Config(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if self.ytdlp_path.trim().is_empty() {
            return Err(AppError::Config("ytdlp_path must not be empty".to_string()));
        }
        if self.audio_quality.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err(AppError::Config(
                "audio_codec and audio_quality must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            codec: self.audio_codec.clone(),
            quality: self.audio_quality.clone(),
        }
    }
}
