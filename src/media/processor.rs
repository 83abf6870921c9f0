use std::path::Path;
use std::process::Command;

use async_trait::async_trait;
use hound::WavReader;
use tracing::{debug, info};

use super::{MediaCommandBuilder, MediaProcessor};
use crate::config::MediaConfig;
use crate::engine::AudioArtifact;
use crate::error::{Result, SubgenError};

/// FFmpeg-backed implementation of the media seam.
pub struct FfmpegProcessor {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegProcessor {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<AudioArtifact> {
        info!(
            "Extracting audio from {} to {}",
            video_path.display(),
            audio_path.display()
        );

        let command = self.command_builder.extract_audio(video_path, audio_path);
        command
            .execute()
            .await
            .map_err(|message| SubgenError::Extraction {
                path: video_path.to_path_buf(),
                message,
            })?;

        let duration_ms =
            probe_wav_duration_ms(audio_path).map_err(|message| SubgenError::Extraction {
                path: video_path.to_path_buf(),
                message,
            })?;

        debug!("Extracted {} ms of audio", duration_ms);
        Ok(AudioArtifact {
            source: video_path.to_path_buf(),
            audio_path: audio_path.to_path_buf(),
            duration_ms,
        })
    }

    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        info!(
            "Burning subtitles from {} onto {} -> {}",
            subtitle_path.display(),
            video_path.display(),
            output_path.display()
        );

        let command = self.command_builder.burn_subtitles(
            video_path,
            subtitle_path,
            output_path,
            &self.config.subtitle_options,
        );
        command.execute().await.map_err(|message| SubgenError::Mux {
            path: video_path.to_path_buf(),
            message,
        })?;

        info!("Subtitle burn-in completed");
        Ok(())
    }

    fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| SubgenError::Config(format!("Media processor not found: {}", e)))?;

        if output.status.success() {
            debug!("Media processor is available");
            Ok(())
        } else {
            Err(SubgenError::Config(
                "Media processor version check failed".to_string(),
            ))
        }
    }

    async fn version_info(&self) -> Result<String> {
        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| SubgenError::Config(format!("Failed to execute media processor: {}", e)))?;

        if output.status.success() {
            let version_info = String::from_utf8_lossy(&output.stdout);
            let first_line = version_info.lines().next().unwrap_or("Unknown version");
            Ok(first_line.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SubgenError::Config(format!(
                "Media processor version check failed: {}",
                stderr
            )))
        }
    }
}

/// Read the duration of a WAV file from its header.
fn probe_wav_duration_ms(path: &Path) -> std::result::Result<u64, String> {
    let reader =
        WavReader::open(path).map_err(|e| format!("Failed to read WAV header: {}", e))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err("WAV header reports a zero sample rate".to_string());
    }

    Ok(reader.duration() as u64 * 1000 / spec.sample_rate as u64)
}
