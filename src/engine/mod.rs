// Speech engine seam.
//
// The batch runner talks to transcription through `SpeechEngine`; the
// only shipped implementation drives the OpenAI whisper CLI. A new
// engine (whisper.cpp, a hosted API) plugs in by implementing the trait
// and growing `EngineImplementation` plus the factory match.

pub mod models;
pub mod whisper_cli;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::job::{Job, TranscribeTask};
use crate::progress::ProgressBridge;

/// Audio extracted from one video, ready for transcription: 16 kHz mono
/// PCM in a WAV container.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// The video the audio came from.
    pub source: PathBuf,
    pub audio_path: PathBuf,
    /// Duration of the audio, which is also the progress total.
    pub duration_ms: u64,
}

/// One timed caption. Times are seconds from the start of the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub language: Option<String>,
    pub segments: Vec<Segment>,
}

/// Per-file engine parameters, resolved from the job once.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub model: String,
    /// Language actually passed to the engine, after english-only models
    /// have overridden the job's hint. `None` means auto-detect.
    pub language: Option<String>,
    pub task: TranscribeTask,
}

impl TranscribeOptions {
    pub fn for_job(job: &Job) -> Self {
        Self {
            model: job.model.clone(),
            language: models::effective_language(&job.model, &job.language),
            task: job.task,
        }
    }
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Validate the model name and the engine binary before any file is
    /// touched. A batch never starts on a failing `prepare`.
    async fn prepare(&self, model: &str) -> Result<()>;

    /// Transcribe one audio artifact, publishing progress into `bridge`.
    /// The engine arms the bridge and marks it complete; resetting it
    /// afterwards is the caller's job.
    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
        options: &TranscribeOptions,
        bridge: Arc<ProgressBridge>,
    ) -> Result<Transcription>;
}

#[derive(Debug, Clone)]
pub enum EngineImplementation {
    WhisperCli,
}

pub struct EngineFactory;

impl EngineFactory {
    pub fn create_engine(
        implementation: EngineImplementation,
        config: EngineConfig,
    ) -> Box<dyn SpeechEngine> {
        match implementation {
            EngineImplementation::WhisperCli => {
                Box::new(whisper_cli::WhisperCliEngine::new(config))
            }
        }
    }

    pub fn create_default(config: EngineConfig) -> Box<dyn SpeechEngine> {
        Self::create_engine(EngineImplementation::WhisperCli, config)
    }
}
