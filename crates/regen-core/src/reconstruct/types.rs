use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{RegenError, Result};
use crate::frame::ChannelLayout;

/// Reconstruction stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconstructStage {
    Synchronizing,
    Emitting,
}

impl fmt::Display for ReconstructStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synchronizing => write!(f, "Reading channels"),
            Self::Emitting => write!(f, "Saving frames"),
        }
    }
}

/// Thread-safe progress reporting for reconstruction jobs.
///
/// Progress is ephemeral: it is never persisted and has no effect on the
/// result. All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    /// A job named `name` is about to start.
    fn begin_job(&self, _name: &str) {}

    /// A new stage started. `total_items` is pixel rows while synchronizing
    /// and frames while emitting.
    fn begin_stage(&self, _stage: ReconstructStage, _total_items: Option<usize>) {}

    /// `items_done` items of the current stage are complete.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_job` delegates.
pub(crate) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Cooperative cancellation flag, checked between chunks and between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RegenError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Result of a completed job.
#[derive(Clone, Debug)]
pub struct JobSummary {
    pub name: String,
    pub layout: ChannelLayout,
    pub frames: usize,
    pub width: u32,
    pub height: u32,
    /// Pixel rows written per channel.
    pub pixel_rows: usize,
    /// Synchronized chunk iterations.
    pub chunks: usize,
    /// Samples outside `[0, 255]` across all channels.
    pub samples_out_of_range: u64,
    pub output_dir: PathBuf,
    /// Emitted files in frame order.
    pub images: Vec<PathBuf>,
}
