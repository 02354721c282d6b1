use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{RegenError, Result};
use crate::frame::VolumeShape;
use crate::volume::ScratchVolume;

use super::config::JobConfig;
use super::emitter::FrameImageEmitter;
use super::synchronizer::Synchronizer;
use super::types::{CancelToken, JobSummary, NoOpReporter, ProgressReporter};

/// Run one reconstruction job with a thread-safe progress reporter.
///
/// The scratch volume is owned by this call: it is removed when the job
/// completes, when any stage fails, and when `cancel` fires.
pub fn run_job_reported(
    config: &JobConfig,
    reporter: Arc<dyn ProgressReporter>,
    cancel: &CancelToken,
) -> Result<JobSummary> {
    config.validate()?;
    if let Some(path) = config.inputs.first_missing() {
        return Err(RegenError::MissingInputFile {
            path: path.to_path_buf(),
        });
    }
    reporter.begin_job(&config.name);

    let mut synchronizer = Synchronizer::open(&config.inputs, &config.reader)?;
    let frames = synchronizer.frame_count();
    let layout = config.inputs.layout();
    let shape = VolumeShape::new(frames, config.geometry, layout);

    info!(
        job = %config.name,
        frames,
        width = config.geometry.width,
        height = config.geometry.height,
        chunk_size = config.reader.chunk_size,
        output = %config.output.display(),
        "Starting reconstruction"
    );

    let mut volume = ScratchVolume::acquire(shape, &config.scratch)?;
    let stats = synchronizer.run(&mut volume, reporter.as_ref(), cancel)?;

    if stats.samples_out_of_range > 0 {
        warn!(
            job = %config.name,
            samples = stats.samples_out_of_range,
            policy = %config.reader.sample_policy,
            "Samples outside [0, 255] were narrowed"
        );
    }
    info!(
        job = %config.name,
        rows = stats.pixel_rows,
        chunks = stats.chunks,
        "Channel files processed, saving frames"
    );

    let emitter = FrameImageEmitter::new(&config.output, &config.emit, layout);
    let images = emitter.emit(&volume, reporter.as_ref(), cancel)?;
    volume.release();

    info!(
        job = %config.name,
        frames = images.len(),
        output = %config.output.display(),
        "Reconstruction complete"
    );

    Ok(JobSummary {
        name: config.name.clone(),
        layout,
        frames,
        width: config.geometry.width,
        height: config.geometry.height,
        pixel_rows: stats.pixel_rows,
        chunks: stats.chunks,
        samples_out_of_range: stats.samples_out_of_range,
        output_dir: config.output.clone(),
        images,
    })
}

/// Run one reconstruction job without progress reporting or cancellation.
pub fn run_job(config: &JobConfig) -> Result<JobSummary> {
    run_job_reported(config, Arc::new(NoOpReporter), &CancelToken::new())
}
