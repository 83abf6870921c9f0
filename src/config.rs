use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubgenError};

fn default_progress_interval() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub media: MediaConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the whisper binary.
    pub binary_path: String,
    /// Decoding temperature passed through to whisper.
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to the ffmpeg binary.
    pub binary_path: String,
    /// Additional encoding options appended to the burn-in command.
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub subtitle_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// How often the host polls the progress cell, in milliseconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                binary_path: "whisper".to_string(),
                temperature: 0.0,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                subtitle_options: vec![],
            },
            batch: BatchConfig {
                progress_interval_ms: default_progress_interval(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubgenError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubgenError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubgenError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubgenError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
