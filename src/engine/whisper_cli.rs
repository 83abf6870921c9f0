// OpenAI Whisper command-line engine.
//
// Spawns `whisper` per file with JSON output into a scratch directory,
// and streams the verbose stdout to feed the progress bridge: every
// decoded segment prints a `[M:SS.mmm --> M:SS.mmm] text` line whose end
// timestamp is the position reached in the audio.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::{models, AudioArtifact, Segment, SpeechEngine, TranscribeOptions, Transcription};
use crate::config::EngineConfig;
use crate::error::{Result, SubgenError};
use crate::progress::ProgressBridge;

/// JSON document the whisper CLI writes next to its other outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCliOutput {
    pub text: String,
    pub segments: Vec<WhisperCliSegment>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCliSegment {
    pub id: u64,
    pub seek: Option<u64>,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub tokens: Option<Vec<i32>>,
    pub temperature: Option<f64>,
    pub avg_logprob: Option<f64>,
    pub compression_ratio: Option<f64>,
    pub no_speech_prob: Option<f64>,
}

impl From<WhisperCliOutput> for Transcription {
    fn from(output: WhisperCliOutput) -> Self {
        let segments = output
            .segments
            .into_iter()
            .filter_map(|segment| {
                let text = segment.text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                let start = segment.start.max(0.0);
                Some(Segment {
                    start,
                    end: segment.end.max(start),
                    text,
                })
            })
            .collect();

        Self {
            language: output.language,
            segments,
        }
    }
}

pub struct WhisperCliEngine {
    config: EngineConfig,
}

impl WhisperCliEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    async fn check_binary(&self, model: &str) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SubgenError::ModelUnavailable {
                model: model.to_string(),
                message: format!(
                    "whisper command not found: {}. Install with: pip install openai-whisper",
                    e
                ),
            })?;

        if output.status.success() {
            debug!("whisper command-line tool is available");
            Ok(())
        } else {
            Err(SubgenError::ModelUnavailable {
                model: model.to_string(),
                message: format!(
                    "whisper binary is not usable: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

#[async_trait]
impl SpeechEngine for WhisperCliEngine {
    async fn prepare(&self, model: &str) -> Result<()> {
        if !models::is_known_model(model) {
            let known: Vec<&str> = models::available_models()
                .iter()
                .map(|info| info.name)
                .collect();
            return Err(SubgenError::ModelUnavailable {
                model: model.to_string(),
                message: format!("unknown model name, expected one of: {}", known.join(", ")),
            });
        }
        self.check_binary(model).await
    }

    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
        options: &TranscribeOptions,
        bridge: Arc<ProgressBridge>,
    ) -> Result<Transcription> {
        info!(
            "Transcribing {} with model {}",
            artifact.source.display(),
            options.model
        );

        let scratch_dir = tempfile::tempdir()
            .map_err(|e| transcription_error(&artifact.source, format!("scratch dir: {}", e)))?;

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(&artifact.audio_path)
            .arg("--model")
            .arg(&options.model)
            .arg("--output_dir")
            .arg(scratch_dir.path())
            .arg("--output_format")
            .arg("json")
            .arg("--task")
            .arg(options.task.as_arg())
            .arg("--temperature")
            .arg(self.config.temperature.to_string())
            .arg("--verbose")
            .arg("True")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(language) = &options.language {
            cmd.arg("--language").arg(language);
        }

        bridge.begin(artifact.duration_ms);

        let mut child = cmd
            .spawn()
            .map_err(|e| transcription_error(&artifact.source, format!("spawn whisper: {}", e)))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            transcription_error(&artifact.source, "whisper stdout was not captured")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            transcription_error(&artifact.source, "whisper stderr was not captured")
        })?;

        let progress_bridge = bridge.clone();
        let relay_progress = async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(position_ms) = parse_progress_line(&line) {
                    progress_bridge.advance(position_ms);
                }
            }
        };
        let collect_stderr = async move {
            let mut buffer = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buffer).await;
            buffer
        };
        let (_, stderr_output) = tokio::join!(relay_progress, collect_stderr);

        let status = child
            .wait()
            .await
            .map_err(|e| transcription_error(&artifact.source, format!("wait on whisper: {}", e)))?;

        if !status.success() {
            return Err(transcription_error(
                &artifact.source,
                format!("whisper exited with {}: {}", status, stderr_output.trim()),
            ));
        }

        let stem = artifact
            .audio_path
            .file_stem()
            .ok_or_else(|| transcription_error(&artifact.source, "audio path has no file stem"))?;
        let json_path = scratch_dir
            .path()
            .join(format!("{}.json", stem.to_string_lossy()));
        let json_content = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            transcription_error(
                &artifact.source,
                format!("whisper JSON output missing at {}: {}", json_path.display(), e),
            )
        })?;
        let output: WhisperCliOutput = serde_json::from_str(&json_content)
            .map_err(|e| transcription_error(&artifact.source, format!("parse JSON: {}", e)))?;

        bridge.complete();
        Ok(output.into())
    }
}

fn transcription_error(path: &Path, message: impl Into<String>) -> SubgenError {
    SubgenError::Transcription {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Pull the end timestamp out of one verbose segment line. Returns `None`
/// for everything whisper prints that is not a segment.
fn parse_progress_line(line: &str) -> Option<u64> {
    let line = line.trim();
    if !line.starts_with('[') {
        return None;
    }
    let range = &line[1..line.find(']')?];
    let (_, end_raw) = range.split_once("-->")?;
    parse_timestamp_ms(end_raw.trim())
}

/// Whisper prints `M:SS.mmm`, growing to `H:MM:SS.mmm` past an hour.
fn parse_timestamp_ms(raw: &str) -> Option<u64> {
    let parts: Vec<&str> = raw.split(':').collect();
    let (hours, minutes_raw, seconds_raw) = match parts.len() {
        2 => (0u64, parts[0], parts[1]),
        3 => (parts[0].parse().ok()?, parts[1], parts[2]),
        _ => return None,
    };
    let minutes: u64 = minutes_raw.parse().ok()?;
    let (seconds_part, millis_part) = seconds_raw.split_once('.')?;
    let seconds: u64 = seconds_part.parse().ok()?;
    let millis: u64 = millis_part.parse().ok()?;

    Some(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}
