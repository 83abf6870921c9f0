use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Sentinel for "no file in flight". Real durations never reach this.
const UNSET: u64 = u64::MAX;

/// Progress of the file currently being transcribed, in milliseconds of
/// source audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileProgress {
    pub current_ms: u64,
    pub total_ms: u64,
}

impl FileProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_ms == 0 {
            1.0
        } else {
            self.current_ms as f64 / self.total_ms as f64
        }
    }
}

/// Shared progress cell between the transcribing worker and the host.
///
/// One writer (the engine) and one reader (the host poller). The worker
/// calls `begin` when a file's duration is known, `advance` as audio is
/// consumed, `complete` when the file is done, and `reset` before moving
/// on. A reader polling `snapshot` sees either a consistent pair or
/// `None`, never a half-written state: `begin` publishes the total last
/// and `reset` retracts it first.
#[derive(Debug)]
pub struct ProgressBridge {
    total: AtomicU64,
    current: AtomicU64,
}

impl Default for ProgressBridge {
    fn default() -> Self {
        Self {
            total: AtomicU64::new(UNSET),
            current: AtomicU64::new(UNSET),
        }
    }
}

impl ProgressBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the cell for a new file. Zeroes the position before the total
    /// becomes visible to the reader.
    pub fn begin(&self, total_ms: u64) {
        self.current.store(0, Ordering::Relaxed);
        self.total.store(total_ms, Ordering::Release);
    }

    /// Move the position forward to `position_ms`. Regressions and
    /// overshoot are clamped; calls while the cell is unarmed are ignored.
    pub fn advance(&self, position_ms: u64) {
        let total = self.total.load(Ordering::Acquire);
        if total == UNSET {
            return;
        }
        self.current.fetch_max(position_ms.min(total), Ordering::AcqRel);
    }

    /// Mark the current file fully transcribed.
    pub fn complete(&self) {
        let total = self.total.load(Ordering::Acquire);
        if total == UNSET {
            return;
        }
        self.current.store(total, Ordering::Release);
    }

    /// Return the cell to the unarmed state.
    pub fn reset(&self) {
        self.total.store(UNSET, Ordering::Release);
        self.current.store(UNSET, Ordering::Relaxed);
    }

    pub fn is_idle(&self) -> bool {
        self.total.load(Ordering::Acquire) == UNSET
    }

    pub fn snapshot(&self) -> Option<FileProgress> {
        let total = self.total.load(Ordering::Acquire);
        if total == UNSET {
            return None;
        }
        let current = self.current.load(Ordering::Acquire);
        if current == UNSET {
            // reset raced us between the two loads
            return None;
        }
        Some(FileProgress {
            current_ms: current.min(total),
            total_ms: total,
        })
    }
}

/// Where polled progress goes. The terminal bar implements this; tests
/// substitute a recorder.
pub trait ProgressSink: Send + Sync {
    /// A file entered transcription with the given audio duration.
    fn begin(&self, total_ms: u64);
    fn update(&self, current_ms: u64, total_ms: u64);
    /// The file left transcription, completed or not.
    fn finish(&self);
}

/// Cooperative stop signal, checked at file boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Poll `bridge` every `interval` and relay file lifecycles to `sink`
/// until `stop` is raised while the bridge is idle.
///
/// Each armed slot becomes one `begin`/`update.../finish` cycle on the
/// sink. A slot that vanishes mid-file (the worker failed or was
/// cancelled) still gets its `finish`.
pub async fn watch<S: ProgressSink>(
    bridge: Arc<ProgressBridge>,
    sink: S,
    interval: Duration,
    stop: CancelFlag,
) {
    loop {
        while bridge.is_idle() {
            if stop.is_cancelled() {
                return;
            }
            tokio::time::sleep(interval).await;
        }

        let Some(first) = bridge.snapshot() else {
            continue;
        };
        sink.begin(first.total_ms);
        loop {
            match bridge.snapshot() {
                Some(progress) => {
                    sink.update(progress.current_ms, progress.total_ms);
                    if progress.current_ms >= progress.total_ms {
                        break;
                    }
                }
                None => break,
            }
            if stop.is_cancelled() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
        sink.finish();

        // Wait out the worker's reset so a finished slot is not mistaken
        // for the next file.
        while !bridge.is_idle() {
            if stop.is_cancelled() {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    }
}
