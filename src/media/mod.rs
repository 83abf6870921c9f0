// Media processing seam.
//
// The pipeline needs exactly two transformations from the media layer:
// pulling a whisper-ready audio track out of a video, and burning
// finished captions back onto one. `commands` assembles the ffmpeg
// invocations, `processor` runs them.

pub mod commands;
pub mod processor;

use std::path::Path;

use async_trait::async_trait;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::engine::AudioArtifact;
use crate::error::Result;

#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Extract the audio track as 16 kHz mono PCM16 WAV and report its
    /// duration.
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<AudioArtifact>;

    /// Render `subtitle_path` onto the video, writing a new file.
    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
    ) -> Result<()>;

    /// Cheap preflight check that the processor binary runs at all.
    fn check_availability(&self) -> Result<()>;

    async fn version_info(&self) -> Result<String>;
}

pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based).
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessor> {
        Box::new(processor::FfmpegProcessor::new(config))
    }
}
