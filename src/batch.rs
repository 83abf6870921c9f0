use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{EngineFactory, SpeechEngine, TranscribeOptions};
use crate::error::{Result, SubgenError};
use crate::job::{FailurePolicy, Job};
use crate::media::{MediaProcessor, MediaProcessorFactory};
use crate::progress::{CancelFlag, ProgressBridge};
use crate::subtitle::write_srt;

/// Where a batch is in its lifecycle. A runner starts `Idle`, is
/// `Running` while files are in flight, and ends `Completed` or
/// `Aborted`. Skipped files do not abort a batch; cancellation and the
/// `Abort` policy do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", label)
    }
}

/// What one successfully processed video produced.
#[derive(Debug, Clone, Default)]
pub struct FileOutput {
    /// Sidecar location, when the job asked for one.
    pub srt_path: Option<PathBuf>,
    /// Subtitled copy, when the job asked for one.
    pub video_path: Option<PathBuf>,
    /// Language the engine detected or was forced to.
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileFailure {
    pub video: PathBuf,
    pub message: String,
}

/// Outcome of a whole batch. Per-file errors live in `failures`; an
/// `Err` from `run` is reserved for batches that never started.
#[derive(Debug)]
pub struct BatchReport {
    pub state: BatchState,
    pub outputs: HashMap<PathBuf, FileOutput>,
    pub failures: Vec<FileFailure>,
}

/// Host-side callbacks for batch lifecycle events. Indices are 1-based,
/// ready for "file 3 of 7" status lines.
#[cfg_attr(test, mockall::automock)]
pub trait BatchObserver: Send + Sync {
    fn file_started(&self, index: usize, total: usize, video: &Path) {
        let _ = (index, total, video);
    }

    fn file_completed(&self, index: usize, total: usize, video: &Path) {
        let _ = (index, total, video);
    }

    fn file_failed(&self, index: usize, total: usize, video: &Path, message: &str) {
        let _ = (index, total, video, message);
    }

    fn batch_finished(&self, state: BatchState) {
        let _ = state;
    }
}

/// Observer for hosts that only want the report.
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Runs a job's videos through the pipeline one at a time: extract,
/// transcribe, serialize, burn in. Owns the progress bridge the host
/// polls and the cancel flag it raises.
pub struct BatchRunner {
    engine: Box<dyn SpeechEngine>,
    media: Box<dyn MediaProcessor>,
    bridge: Arc<ProgressBridge>,
    cancel: CancelFlag,
    state: BatchState,
}

impl BatchRunner {
    pub fn new(config: &Config) -> Result<Self> {
        let engine = EngineFactory::create_default(config.engine.clone());
        let media = MediaProcessorFactory::create_processor(config.media.clone());

        media.check_availability()?;

        Ok(Self::with_components(engine, media))
    }

    /// Assemble a runner from explicit collaborators.
    pub fn with_components(
        engine: Box<dyn SpeechEngine>,
        media: Box<dyn MediaProcessor>,
    ) -> Self {
        Self {
            engine,
            media,
            bridge: Arc::new(ProgressBridge::new()),
            cancel: CancelFlag::new(),
            state: BatchState::Idle,
        }
    }

    /// The cell a host poller watches. Idle between files and between
    /// batches.
    pub fn bridge(&self) -> Arc<ProgressBridge> {
        self.bridge.clone()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Run the whole job. Returns `Err` only when the batch cannot start
    /// at all: an invalid job, an unusable model, or an unwritable
    /// output directory. Everything after the first file starts is
    /// reported through the returned `BatchReport` and the observer.
    pub async fn run(&mut self, job: &Job, observer: &dyn BatchObserver) -> Result<BatchReport> {
        job.validate()?;
        self.engine.prepare(&job.model).await?;
        fs::create_dir_all(&job.output_dir).await?;
        let workspace = tempfile::tempdir()?;

        self.state = BatchState::Running;
        let options = TranscribeOptions::for_job(job);
        let total = job.videos.len();
        let mut outputs = HashMap::new();
        let mut failures = Vec::new();

        for (index, video) in job.videos.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Batch cancelled before file {} of {}", index + 1, total);
                self.bridge.reset();
                self.state = BatchState::Aborted;
                break;
            }

            info!("Processing file {} of {}: {}", index + 1, total, video.display());
            observer.file_started(index + 1, total, video);

            match self
                .process_video(video, job, &options, workspace.path())
                .await
            {
                Ok(output) => {
                    info!("Successfully processed: {}", video.display());
                    observer.file_completed(index + 1, total, video);
                    outputs.insert(video.clone(), output);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("Failed to process {}: {}", video.display(), message);
                    observer.file_failed(index + 1, total, video, &message);
                    failures.push(FileFailure {
                        video: video.clone(),
                        message,
                    });
                    if job.policy == FailurePolicy::Abort {
                        self.state = BatchState::Aborted;
                        break;
                    }
                }
            }
        }

        if self.state == BatchState::Running {
            self.state = BatchState::Completed;
        }
        self.bridge.reset();
        info!(
            "Batch {}: {} file(s) succeeded, {} failed",
            self.state,
            outputs.len(),
            failures.len()
        );
        observer.batch_finished(self.state);

        Ok(BatchReport {
            state: self.state,
            outputs,
            failures,
        })
    }

    async fn process_video(
        &self,
        video: &Path,
        job: &Job,
        options: &TranscribeOptions,
        workspace: &Path,
    ) -> Result<FileOutput> {
        if !video.exists() {
            return Err(SubgenError::FileNotFound(video.display().to_string()));
        }
        let stem = video
            .file_stem()
            .ok_or_else(|| SubgenError::Config("Invalid video filename".to_string()))?
            .to_string_lossy()
            .to_string();

        let audio_path = workspace.join(format!("{}.wav", stem));
        let artifact = self.media.extract_audio(video, &audio_path).await?;

        // The bridge must be idle again whatever transcription did, so
        // the reset sits between the call and the `?`.
        let result = self
            .engine
            .transcribe(&artifact, options, self.bridge.clone())
            .await;
        self.bridge.reset();
        let transcription = result?;

        // The sidecar a muxed video is built from only lands in the
        // output directory when the job asked for it; otherwise it lives
        // and dies with the workspace.
        let srt_path = if job.emit_subtitles {
            job.output_dir.join(format!("{}.srt", stem))
        } else {
            workspace.join(format!("{}.srt", stem))
        };
        write_srt(&transcription.segments, &srt_path).await?;

        let mut output = FileOutput {
            srt_path: job.emit_subtitles.then(|| srt_path.clone()),
            video_path: None,
            language: transcription.language.clone(),
        };

        if job.emit_video {
            let video_out = subtitled_video_path(video, &job.output_dir)?;
            self.media
                .burn_subtitles(video, &srt_path, &video_out)
                .await?;
            output.video_path = Some(video_out);
        }

        Ok(output)
    }
}

/// Name for the subtitled copy: `<stem>.mp4` in the output directory,
/// stepping aside to `<stem>.subtitled.mp4` when that would be the
/// source file itself.
fn subtitled_video_path(video: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = video
        .file_stem()
        .ok_or_else(|| SubgenError::Config("Invalid video filename".to_string()))?
        .to_string_lossy()
        .to_string();

    let candidate = output_dir.join(format!("{}.mp4", stem));
    if points_at(&candidate, video) {
        Ok(output_dir.join(format!("{}.subtitled.mp4", stem)))
    } else {
        Ok(candidate)
    }
}

/// Whether `candidate` (which may not exist yet) resolves to `existing`.
fn points_at(candidate: &Path, existing: &Path) -> bool {
    let resolved_existing = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    let resolved_candidate = match (candidate.parent(), candidate.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| candidate.to_path_buf()),
        _ => candidate.to_path_buf(),
    };
    resolved_candidate == resolved_existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mockall::predicate;

    use crate::engine::{AudioArtifact, Segment, Transcription};
    use crate::job::LanguageHint;

    /// Engine stub that arms the bridge like the real one and records
    /// which artifacts it saw.
    struct StubEngine {
        calls: Mutex<Vec<PathBuf>>,
        fail_on: HashSet<PathBuf>,
        prepare_error: Option<String>,
        cancel_after_transcribe: Option<CancelFlag>,
        silent: bool,
    }

    impl StubEngine {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: HashSet::new(),
                prepare_error: None,
                cancel_after_transcribe: None,
                silent: false,
            }
        }

        fn failing_on(mut self, video: &Path) -> Self {
            self.fail_on.insert(video.to_path_buf());
            self
        }

        fn with_prepare_error(mut self, message: &str) -> Self {
            self.prepare_error = Some(message.to_string());
            self
        }

        fn cancelling(mut self, flag: CancelFlag) -> Self {
            self.cancel_after_transcribe = Some(flag);
            self
        }

        /// Transcribe to no segments at all, as a speechless video would.
        fn silent(mut self) -> Self {
            self.silent = true;
            self
        }
    }

    #[async_trait]
    impl SpeechEngine for StubEngine {
        async fn prepare(&self, model: &str) -> Result<()> {
            match &self.prepare_error {
                Some(message) => Err(SubgenError::ModelUnavailable {
                    model: model.to_string(),
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }

        async fn transcribe(
            &self,
            artifact: &AudioArtifact,
            _options: &TranscribeOptions,
            bridge: Arc<ProgressBridge>,
        ) -> Result<Transcription> {
            assert!(bridge.is_idle(), "bridge must be reset between files");
            self.calls.lock().unwrap().push(artifact.source.clone());
            bridge.begin(artifact.duration_ms);
            bridge.advance(artifact.duration_ms / 2);

            if self.fail_on.contains(&artifact.source) {
                // fail without completing: the runner owns the reset
                return Err(SubgenError::Transcription {
                    path: artifact.source.clone(),
                    message: "stub failure".to_string(),
                });
            }

            bridge.complete();
            if let Some(flag) = &self.cancel_after_transcribe {
                flag.cancel();
            }
            let segments = if self.silent {
                vec![]
            } else {
                vec![Segment {
                    start: 0.0,
                    end: 1.0,
                    text: "stub caption".to_string(),
                }]
            };
            Ok(Transcription {
                language: Some("en".to_string()),
                segments,
            })
        }
    }

    /// Media stub: fabricates the WAV artifact and records burn-ins.
    struct StubMedia {
        burns: Mutex<Vec<PathBuf>>,
        fail_on: HashSet<PathBuf>,
    }

    impl StubMedia {
        fn new() -> Self {
            Self {
                burns: Mutex::new(Vec::new()),
                fail_on: HashSet::new(),
            }
        }

        /// Refuse to extract audio from the given video.
        fn failing_on(mut self, video: &Path) -> Self {
            self.fail_on.insert(video.to_path_buf());
            self
        }
    }

    #[async_trait]
    impl MediaProcessor for StubMedia {
        async fn extract_audio(
            &self,
            video_path: &Path,
            audio_path: &Path,
        ) -> Result<AudioArtifact> {
            if self.fail_on.contains(video_path) {
                return Err(SubgenError::Extraction {
                    path: video_path.to_path_buf(),
                    message: "no audio stream".to_string(),
                });
            }
            Ok(AudioArtifact {
                source: video_path.to_path_buf(),
                audio_path: audio_path.to_path_buf(),
                duration_ms: 2_000,
            })
        }

        async fn burn_subtitles(
            &self,
            _video_path: &Path,
            _subtitle_path: &Path,
            output_path: &Path,
        ) -> Result<()> {
            self.burns.lock().unwrap().push(output_path.to_path_buf());
            Ok(())
        }

        fn check_availability(&self) -> Result<()> {
            Ok(())
        }

        async fn version_info(&self) -> Result<String> {
            Ok("stub media".to_string())
        }
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"video bytes").unwrap();
    }

    fn test_job(dir: &Path, videos: &[&str]) -> (Job, Vec<PathBuf>) {
        let paths: Vec<PathBuf> = videos
            .iter()
            .map(|name| {
                let path = dir.join(name);
                touch(&path);
                path
            })
            .collect();
        let job = Job::new(paths.clone(), "tiny.en", dir.join("out"));
        (job, paths)
    }

    #[tokio::test]
    async fn test_batch_completes_and_writes_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["one.mp4", "two.mp4"]);

        let mut runner = BatchRunner::with_components(
            Box::new(StubEngine::new()),
            Box::new(StubMedia::new()),
        );
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(runner.state(), BatchState::Completed);
        assert!(report.failures.is_empty());
        assert_eq!(report.outputs.len(), 2);

        for path in &paths {
            let output = &report.outputs[path];
            let srt = output.srt_path.as_ref().unwrap();
            assert!(srt.exists());
            assert!(srt.starts_with(&job.output_dir));
            assert!(output.video_path.is_none());
        }
    }

    #[tokio::test]
    async fn test_skip_policy_continues_past_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["bad.mp4", "good.mp4"]);

        let engine = StubEngine::new().failing_on(&paths[0]);
        let mut runner =
            BatchRunner::with_components(Box::new(engine), Box::new(StubMedia::new()));
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].video, paths[0]);
        assert!(report.outputs.contains_key(&paths[1]));
        assert!(!report.outputs.contains_key(&paths[0]));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_a_per_file_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["a.mp4", "b.mp4", "c.mp4"]);

        let media = StubMedia::new().failing_on(&paths[1]);
        let mut runner =
            BatchRunner::with_components(Box::new(StubEngine::new()), Box::new(media));
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].video, paths[1]);
        assert!(report.failures[0].message.contains("no audio stream"));
    }

    #[tokio::test]
    async fn test_empty_transcription_still_writes_and_burns() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["silent.mp4"]);
        let job = job.with_outputs(true, true);

        let engine = StubEngine::new().silent();
        let mut runner =
            BatchRunner::with_components(Box::new(engine), Box::new(StubMedia::new()));
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        let output = &report.outputs[&paths[0]];

        // captionless sidecar, but the burn-in still happened
        let srt = output.srt_path.as_ref().unwrap();
        assert_eq!(std::fs::read_to_string(srt).unwrap(), "");
        assert!(output.video_path.is_some());
    }

    #[tokio::test]
    async fn test_abort_policy_stops_at_the_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["bad.mp4", "never.mp4"]);
        let job = job.with_policy(FailurePolicy::Abort);

        let engine = StubEngine::new().failing_on(&paths[0]);
        let mut runner =
            BatchRunner::with_components(Box::new(engine), Box::new(StubMedia::new()));
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        assert_eq!(report.state, BatchState::Aborted);
        assert_eq!(report.failures.len(), 1);
        assert!(report.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_bridge_is_idle_after_each_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["bad.mp4", "good.mp4"]);

        // the failing engine arms the bridge and never completes it
        let engine = StubEngine::new().failing_on(&paths[0]);
        let mut runner =
            BatchRunner::with_components(Box::new(engine), Box::new(StubMedia::new()));
        let bridge = runner.bridge();

        let report = runner.run(&job, &NoopObserver).await.unwrap();
        assert_eq!(report.state, BatchState::Completed);
        assert!(bridge.is_idle());
        assert_eq!(bridge.snapshot(), None);
    }

    #[tokio::test]
    async fn test_cancellation_stops_at_the_file_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["first.mp4", "second.mp4"]);

        let mut runner = BatchRunner::with_components(
            Box::new(StubEngine::new()),
            Box::new(StubMedia::new()),
        );
        // raised mid-batch, as a Ctrl-C would
        let engine = StubEngine::new().cancelling(runner.cancel_flag());
        runner.engine = Box::new(engine);

        let bridge = runner.bridge();
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        assert_eq!(report.state, BatchState::Aborted);
        assert!(report.outputs.contains_key(&paths[0]));
        assert!(!report.outputs.contains_key(&paths[1]));
        assert!(bridge.is_idle());
    }

    #[tokio::test]
    async fn test_preflight_failure_never_starts_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (job, _) = test_job(dir.path(), &["one.mp4"]);

        let engine = StubEngine::new().with_prepare_error("no such model");
        let mut runner =
            BatchRunner::with_components(Box::new(engine), Box::new(StubMedia::new()));
        let result = runner.run(&job, &NoopObserver).await;

        assert!(matches!(
            result,
            Err(SubgenError::ModelUnavailable { .. })
        ));
        assert_eq!(runner.state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn test_empty_job_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new(vec![], "tiny.en", dir.path().join("out"));

        let mut runner = BatchRunner::with_components(
            Box::new(StubEngine::new()),
            Box::new(StubMedia::new()),
        );
        assert!(runner.run(&job, &NoopObserver).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_video_is_a_per_file_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (mut job, _) = test_job(dir.path(), &["real.mp4"]);
        job.videos.push(dir.path().join("ghost.mp4"));

        let mut runner = BatchRunner::with_components(
            Box::new(StubEngine::new()),
            Box::new(StubMedia::new()),
        );
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("ghost.mp4"));
    }

    #[tokio::test]
    async fn test_emit_video_burns_and_degenerate_job_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (job, _) = test_job(dir.path(), &["clip.mp4"]);
        let job = job.with_outputs(false, true);

        let media = Box::new(StubMedia::new());
        let mut runner = BatchRunner::with_components(Box::new(StubEngine::new()), media);
        let report = runner.run(&job, &NoopObserver).await.unwrap();

        let output = report.outputs.values().next().unwrap();
        assert!(output.srt_path.is_none());
        assert_eq!(
            output.video_path.as_deref(),
            Some(job.output_dir.join("clip.mp4").as_path())
        );

        // neither flag: pipeline runs, output dir stays empty
        let (job, _) = test_job(dir.path(), &["quiet.mp4"]);
        let job = job.with_outputs(false, false);
        let mut runner = BatchRunner::with_components(
            Box::new(StubEngine::new()),
            Box::new(StubMedia::new()),
        );
        let report = runner.run(&job, &NoopObserver).await.unwrap();
        assert_eq!(report.state, BatchState::Completed);
        let leftovers: Vec<_> = std::fs::read_dir(&job.output_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_the_whole_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (job, paths) = test_job(dir.path(), &["bad.mp4", "good.mp4"]);

        let mut observer = MockBatchObserver::new();
        observer.expect_file_started().times(2).return_const(());
        let failing = paths[0].clone();
        observer
            .expect_file_failed()
            .withf(move |index, total, video, _| {
                *index == 1 && *total == 2 && video == failing.as_path()
            })
            .times(1)
            .return_const(());
        let succeeding = paths[1].clone();
        observer
            .expect_file_completed()
            .withf(move |index, total, video| {
                *index == 2 && *total == 2 && video == succeeding.as_path()
            })
            .times(1)
            .return_const(());
        observer
            .expect_batch_finished()
            .with(predicate::eq(BatchState::Completed))
            .times(1)
            .return_const(());

        let engine = StubEngine::new().failing_on(&paths[0]);
        let mut runner =
            BatchRunner::with_components(Box::new(engine), Box::new(StubMedia::new()));
        runner.run(&job, &observer).await.unwrap();
    }

    #[test]
    fn test_subtitled_video_path_avoids_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.mp4");
        touch(&source);

        // output directory is the source's own directory
        let clashing = subtitled_video_path(&source, dir.path()).unwrap();
        assert_eq!(clashing, dir.path().join("movie.subtitled.mp4"));

        // a different output directory keeps the plain name
        let elsewhere = dir.path().join("out");
        std::fs::create_dir_all(&elsewhere).unwrap();
        let plain = subtitled_video_path(&source, &elsewhere).unwrap();
        assert_eq!(plain, elsewhere.join("movie.mp4"));

        // non-mp4 sources never clash
        let mkv = dir.path().join("show.mkv");
        touch(&mkv);
        let from_mkv = subtitled_video_path(&mkv, dir.path()).unwrap();
        assert_eq!(from_mkv, dir.path().join("show.mp4"));
    }

    #[tokio::test]
    async fn test_language_forcing_reaches_the_engine_options() {
        let dir = tempfile::tempdir().unwrap();
        let (job, _) = test_job(dir.path(), &["clip.mp4"]);
        let job = job.with_language(LanguageHint::Code("ja".to_string()));

        // tiny.en forces English whatever the hint says
        let options = TranscribeOptions::for_job(&job);
        assert_eq!(options.language.as_deref(), Some("en"));
    }
}
