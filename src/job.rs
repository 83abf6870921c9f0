use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubgenError};

/// Language codes whisper accepts for the `--language` option.
const LANGUAGE_CODES: &[&str] = &[
    "af", "am", "ar", "as", "az", "ba", "be", "bg", "bn", "bo", "br", "bs", "ca", "cs", "cy", "da",
    "de", "el", "en", "es", "et", "eu", "fa", "fi", "fo", "fr", "gl", "gu", "ha", "haw", "he",
    "hi", "hr", "ht", "hu", "hy", "id", "is", "it", "ja", "jw", "ka", "kk", "km", "kn", "ko",
    "la", "lb", "ln", "lo", "lt", "lv", "mg", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my",
    "ne", "nl", "nn", "no", "oc", "pa", "pl", "ps", "pt", "ro", "ru", "sa", "sd", "si", "sk",
    "sl", "sn", "so", "sq", "sr", "su", "sv", "sw", "ta", "te", "tg", "th", "tk", "tl", "tr",
    "tt", "uk", "ur", "uz", "vi", "yi", "yo", "zh",
];

/// Source-language hint passed through to the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageHint {
    /// Let the engine detect the language.
    Auto,
    /// Force a specific ISO 639-1 code.
    Code(String),
}

impl LanguageHint {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        if value == "auto" || value.is_empty() {
            return Ok(Self::Auto);
        }
        if LANGUAGE_CODES.contains(&value.as_str()) {
            Ok(Self::Code(value))
        } else {
            Err(SubgenError::Config(format!(
                "Unknown language code: {}",
                value
            )))
        }
    }

    pub fn as_code(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Code(code) => Some(code.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscribeTask {
    /// Same-language speech recognition.
    Transcribe,
    /// X -> English translation.
    Translate,
}

impl TranscribeTask {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Translate => "translate",
        }
    }
}

/// What the batch does when a single file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure and continue with the next file.
    Skip,
    /// Stop the batch at the first failing file.
    Abort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// A batch request: which videos to process and what to produce for each.
#[derive(Debug, Clone)]
pub struct Job {
    /// Videos to process, in order.
    pub videos: Vec<PathBuf>,
    /// Whisper model name, e.g. "tiny.en" or "medium".
    pub model: String,
    pub language: LanguageHint,
    pub task: TranscribeTask,
    /// Write the .srt sidecar into the output directory.
    pub emit_subtitles: bool,
    /// Burn the captions onto a copy of the video.
    pub emit_video: bool,
    /// Directory receiving sidecars and subtitled videos.
    pub output_dir: PathBuf,
    pub policy: FailurePolicy,
}

impl Job {
    pub fn new<P: Into<PathBuf>>(videos: Vec<PathBuf>, model: &str, output_dir: P) -> Self {
        Self {
            videos,
            model: model.to_string(),
            language: LanguageHint::Auto,
            task: TranscribeTask::Transcribe,
            emit_subtitles: true,
            emit_video: false,
            output_dir: output_dir.into(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_language(mut self, language: LanguageHint) -> Self {
        self.language = language;
        self
    }

    pub fn with_task(mut self, task: TranscribeTask) -> Self {
        self.task = task;
        self
    }

    pub fn with_outputs(mut self, emit_subtitles: bool, emit_video: bool) -> Self {
        self.emit_subtitles = emit_subtitles;
        self.emit_video = emit_video;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.videos.is_empty() {
            return Err(SubgenError::Config(
                "No input videos given".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(SubgenError::Config("Model name is empty".to_string()));
        }
        Ok(())
    }
}
