//! Subgen - Batch Subtitle Generation
//!
//! This is the main entry point for the subgen command line tool, which
//! transcribes batches of video files with whisper and attaches the
//! resulting subtitles as .srt sidecars or burned-in captions via ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use subgen::batch::{BatchObserver, BatchReport, BatchRunner, BatchState};
use subgen::cli::{Args, Commands};
use subgen::config::Config;
use subgen::engine::models;
use subgen::error::SubgenError;
use subgen::job::{FailurePolicy, Job, LanguageHint, TranscribeTask};
use subgen::media::MediaProcessorFactory;
use subgen::progress::{watch, CancelFlag, ProgressSink};
use subgen::subtitle;

const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Convert {
            videos,
            model,
            language,
            task,
            srt,
            mux,
            output_dir,
            policy,
        } => {
            let language = LanguageHint::parse(&language)?;
            let task = parse_task(&task)?;
            let policy = parse_failure_policy(&policy)?;

            let inputs = collect_videos(&videos)?;
            let output_dir = resolve_output_dir(output_dir, &inputs)?;
            info!(
                "Converting {} video(s) into {}",
                inputs.len(),
                output_dir.display()
            );

            let job = Job::new(inputs, &model, output_dir)
                .with_language(language)
                .with_task(task)
                .with_outputs(srt, mux)
                .with_policy(policy);

            let report = run_batch(&config, &job).await?;
            print_summary(&report);
            if report.state == BatchState::Aborted || !report.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Commands::Extract { input, output } => {
            info!("Extracting audio from: {}", input.display());
            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability()?;
            let artifact = media.extract_audio(&input, &output).await?;
            println!(
                "Extracted {} of audio to {}",
                format_clock(artifact.duration_ms),
                output.display()
            );
        }
        Commands::Mux {
            video,
            subtitles,
            output,
        } => {
            info!("Burning subtitles onto video: {}", video.display());
            let content = std::fs::read_to_string(&subtitles)?;
            let segments = subtitle::parse_srt(&content)?;
            info!("Subtitle file carries {} captions", segments.len());

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability()?;
            media.burn_subtitles(&video, &subtitles, &output).await?;
            println!("Wrote {}", output.display());
        }
        Commands::Models => {
            println!("\nAvailable Whisper Models:");
            println!("{:<12} {:<12} {:<15}", "Name", "Size (MB)", "Languages");
            println!("{}", "-".repeat(39));
            for model in models::available_models() {
                let languages = if model.english_only {
                    "English only"
                } else {
                    "Multilingual"
                };
                println!(
                    "{:<12} {:<12.0} {:<15}",
                    model.name, model.size_mb, languages
                );
            }
        }
    }

    Ok(())
}

/// Run one batch with the terminal wired up: Ctrl-C raises the cancel
/// flag, and a background poller relays the progress cell into a bar.
async fn run_batch(config: &Config, job: &Job) -> Result<BatchReport> {
    let mut runner = BatchRunner::new(config)?;

    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current file");
            cancel.cancel();
        }
    });

    let watcher_stop = CancelFlag::new();
    let watcher = tokio::spawn(watch(
        runner.bridge(),
        TerminalSink::new(),
        Duration::from_millis(config.batch.progress_interval_ms),
        watcher_stop.clone(),
    ));

    let result = runner.run(job, &ConsoleObserver).await;

    watcher_stop.cancel();
    let _ = watcher.await;

    Ok(result?)
}

/// Renders the current file's transcription progress as an indicatif bar.
struct TerminalSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalSink {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl ProgressSink for TerminalSink {
    fn begin(&self, total_ms: u64) {
        let bar = ProgressBar::new(total_ms);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn update(&self, current_ms: u64, total_ms: u64) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_position(current_ms);
                bar.set_message(format!(
                    "{} / {}",
                    format_clock(current_ms),
                    format_clock(total_ms)
                ));
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

/// Prints per-file status lines around the progress bar.
struct ConsoleObserver;

impl BatchObserver for ConsoleObserver {
    fn file_started(&self, index: usize, total: usize, video: &Path) {
        println!("Processing file {} of {}: {}", index, total, file_label(video));
    }

    fn file_failed(&self, index: usize, total: usize, video: &Path, message: &str) {
        eprintln!(
            "Failed file {} of {} ({}): {}",
            index,
            total,
            file_label(video),
            message
        );
    }
}

fn file_label(video: &Path) -> String {
    video
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| video.display().to_string())
}

fn print_summary(report: &BatchReport) {
    println!(
        "\nBatch {}: {} succeeded, {} failed",
        report.state,
        report.outputs.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  failed: {} ({})", failure.video.display(), failure.message);
    }
}

/// Expand the positional inputs: files pass through, directories are
/// walked for anything with a known video extension.
fn collect_videos(inputs: &[PathBuf]) -> subgen::error::Result<Vec<PathBuf>> {
    let mut videos = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
                    if VIDEO_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
                        found.push(path.to_path_buf());
                    }
                }
            }
            found.sort();
            info!(
                "Found {} video files under {}",
                found.len(),
                input.display()
            );
            videos.extend(found);
        } else {
            videos.push(input.clone());
        }
    }

    if videos.is_empty() {
        return Err(SubgenError::Config(
            "No video files found in the given inputs".to_string(),
        ));
    }
    Ok(videos)
}

/// Default output directory is the directory of the first input.
fn resolve_output_dir(
    explicit: Option<PathBuf>,
    inputs: &[PathBuf],
) -> subgen::error::Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    let parent = inputs
        .first()
        .and_then(|path| path.parent())
        .ok_or_else(|| SubgenError::Config("Cannot determine output directory".to_string()))?;
    if parent.as_os_str().is_empty() {
        Ok(PathBuf::from("."))
    } else {
        Ok(parent.to_path_buf())
    }
}

fn format_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn parse_task(task: &str) -> subgen::error::Result<TranscribeTask> {
    match task.to_lowercase().as_str() {
        "transcribe" => Ok(TranscribeTask::Transcribe),
        "translate" => Ok(TranscribeTask::Translate),
        _ => Err(SubgenError::Config(format!(
            "Invalid task '{}'. Valid tasks: transcribe, translate",
            task
        ))),
    }
}

fn parse_failure_policy(policy: &str) -> subgen::error::Result<FailurePolicy> {
    match policy.to_lowercase().as_str() {
        "skip" => Ok(FailurePolicy::Skip),
        "abort" => Ok(FailurePolicy::Abort),
        _ => Err(SubgenError::Config(format!(
            "Invalid policy '{}'. Valid policies: skip, abort",
            policy
        ))),
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let subgen_dir = std::env::current_dir()?.join(".subgen");
    let log_dir = subgen_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "subgen.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subgen.log").display()
    );

    Ok(())
}
