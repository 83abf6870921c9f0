use std::path::Path;
use std::process::Command;

use tracing::debug;

/// One ffmpeg invocation, assembled argument by argument.
///
/// Execution reports failures as plain strings; the processor wraps them
/// into the right pipeline error with the file being processed attached.
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    pub async fn execute(&self) -> std::result::Result<(), String> {
        debug!(
            "Executing media command: {} {:?}",
            self.binary_path, self.args
        );

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args);

        let output = cmd
            .output()
            .map_err(|e| format!("Failed to execute media processor: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} failed: {}", self.description, stderr.trim()));
        }

        Ok(())
    }
}

/// Builds the commands the pipeline needs.
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Audio extraction: strip the video stream and resample to the
    /// 16 kHz mono PCM16 WAV whisper expects.
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Subtitle burn-in: re-encode the video with captions rendered via
    /// the subtitles filter, audio stream untouched.
    pub fn burn_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
        additional_options: &[String],
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Subtitle burn-in")
            .overwrite()
            .input(&video_path)
            .video_filter(format!(
                "subtitles={}:force_style='OutlineColour=&H40000000,BorderStyle=3'",
                subtitle_path.as_ref().display()
            ))
            .video_codec("libx264")
            .copy_audio();

        for option in additional_options {
            cmd = cmd.arg(option);
        }

        cmd.output(output_path)
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_audio_command_shape() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.extract_audio("in.mp4", "out.wav");

        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-i", "in.mp4", "-vn", "-c:a", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y",
                "out.wav"
            ]
        );
    }

    #[test]
    fn test_burn_subtitles_command_shape() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.burn_subtitles("in.mp4", "in.srt", "out.mp4", &[]);

        let args = cmd.args.join(" ");
        assert!(args.starts_with("-y -i in.mp4"));
        assert!(args.contains(
            "subtitles=in.srt:force_style='OutlineColour=&H40000000,BorderStyle=3'"
        ));
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-c:a copy"));
        assert!(args.ends_with("out.mp4"));
    }

    #[test]
    fn test_burn_subtitles_appends_extra_options() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let extra = vec!["-preset".to_string(), "fast".to_string()];
        let cmd = builder.burn_subtitles("in.mp4", "in.srt", "out.mp4", &extra);

        let args = cmd.args.join(" ");
        assert!(args.contains("-preset fast"));
        assert!(args.ends_with("out.mp4"));
    }

    #[tokio::test]
    async fn test_execute_reports_missing_binary() {
        let cmd = MediaCommand::new("definitely-not-ffmpeg-here", "Test run").arg("-version");
        let result = cmd.execute().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Failed to execute"));
    }
}
