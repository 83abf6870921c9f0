//! Subgen - Batch Subtitle Generation
//!
//! A batch pipeline for subtitling video files: ffmpeg extracts the
//! audio, whisper transcribes it, the segments become an SRT sidecar,
//! and the captions can be burned back onto the video. A shared progress
//! cell lets the host render per-file progress while a batch runs.

pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod media;
pub mod progress;
pub mod subtitle;
