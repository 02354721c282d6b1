//! Sequential runner for independent reconstruction jobs.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, warn};

use crate::error::RegenError;

use super::config::BatchConfig;
use super::orchestrator::run_job_reported;
use super::types::{CancelToken, JobSummary, ProgressReporter};

/// How a single job of a batch ended.
#[derive(Debug)]
pub enum JobStatus {
    Completed(JobSummary),
    /// An input file was missing; nothing was allocated or written.
    Skipped { missing: PathBuf },
    Failed(RegenError),
    Cancelled,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub status: JobStatus,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Completed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Failed(_)))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Cancelled))
    }

    /// True when no job failed or was cancelled. Skipped jobs do not count
    /// as failures.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.cancelled() == 0
    }
}

/// Run every job of `config` in order.
///
/// Jobs are isolated: each owns its scratch volume and output directory, and
/// a failing or skipped job never prevents the next one from running. Once
/// `cancel` fires, the remaining jobs are reported as cancelled.
pub fn run_batch(
    config: &BatchConfig,
    reporter: Arc<dyn ProgressReporter>,
    cancel: &CancelToken,
) -> BatchReport {
    let mut report = BatchReport::default();

    for job in config.job_configs() {
        let status = if cancel.is_cancelled() {
            JobStatus::Cancelled
        } else {
            match run_job_reported(&job, Arc::clone(&reporter), cancel) {
                Ok(summary) => JobStatus::Completed(summary),
                Err(RegenError::MissingInputFile { path }) => {
                    warn!(
                        job = %job.name,
                        path = %path.display(),
                        "Skipping job: input not found"
                    );
                    JobStatus::Skipped { missing: path }
                }
                Err(RegenError::Cancelled) => {
                    warn!(job = %job.name, "Job cancelled");
                    JobStatus::Cancelled
                }
                Err(e) => {
                    error!(job = %job.name, error = %e, "Job failed");
                    JobStatus::Failed(e)
                }
            }
        };

        report.outcomes.push(JobOutcome {
            name: job.name,
            status,
        });
    }

    report
}
