// src/error.rs

use serde_json::Error as SerdeError;
use std::io;
use thiserror::Error;

/// Custom error types for the application
#[derive(Error, Debug)]
pub enum AppError {
    /// Blank URL handed to the list
    #[error("Please enter a YouTube URL")]
    EmptyInput,

    /// URL already present in the list (prefix match on the display text)
    #[error("This URL is already in the list: {0}")]
    Duplicate(String),

    /// Download triggered without a target folder
    #[error("Please select a folder")]
    MissingFolder,

    /// Any failure reported by the media fetch service
    #[error("{0}")]
    Fetch(String),

    /// Download aborted through its cancellation token
    #[error("Download cancelled")]
    Cancelled,

    /// Error for missing dependencies
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// Error for invalid input validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration file problems
    #[error("Config error: {0}")]
    Config(String),

    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] SerdeError),

    /// General application errors
    #[error("Application error: {0}")]
    General(String),
}

impl AppError {
    /// Errors the user caused through input; the front end reports these and keeps going.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AppError::EmptyInput | AppError::Duplicate(_) | AppError::MissingFolder
        )
    }
}

/// Convert a string error to AppError::General
impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::General(error)
    }
}

/// Convert a &str error to AppError::General
impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::General(error.to_string())
    }
}
