pub mod batch;
pub mod config;
pub mod emitter;
pub mod synchronizer;
mod orchestrator;
mod types;

pub use batch::{run_batch, BatchReport, JobOutcome, JobStatus};
pub use orchestrator::{run_job, run_job_reported};
pub use types::{CancelToken, JobSummary, ProgressReporter, ReconstructStage};
