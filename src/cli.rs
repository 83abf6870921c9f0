use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate subtitles for video files or directories of videos
    Convert {
        /// Video files or directories to process
        #[arg(required = true)]
        videos: Vec<PathBuf>,

        /// Whisper model to use
        #[arg(short, long, default_value = "tiny.en")]
        model: String,

        /// Source language, or "auto" to detect it
        #[arg(short, long, default_value = "auto")]
        language: String,

        /// "transcribe" keeps the source language, "translate" targets English
        #[arg(long, default_value = "transcribe")]
        task: String,

        /// Whether to write .srt sidecars into the output directory
        #[arg(long, default_value = "true", action = ArgAction::Set)]
        srt: bool,

        /// Whether to burn the subtitles onto a copy of each video
        #[arg(long, default_value = "false", action = ArgAction::Set)]
        mux: bool,

        /// Output directory (defaults to the first input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// What a failing file does to the batch: "skip" or "abort"
        #[arg(long, default_value = "skip")]
        policy: String,
    },

    /// Extract a whisper-ready WAV from a video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output audio file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Burn an existing subtitle file onto a video
    Mux {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the whisper models this tool accepts
    Models,
}
