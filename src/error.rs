use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubgenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Audio extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Model '{model}' is not usable: {message}")]
    ModelUnavailable { model: String, message: String },

    #[error("Transcription failed for {path}: {message}")]
    Transcription { path: PathBuf, message: String },

    #[error("Subtitle burn-in failed for {path}: {message}")]
    Mux { path: PathBuf, message: String },

    #[error("Subtitle error: {0}")]
    Subtitle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, SubgenError>;
