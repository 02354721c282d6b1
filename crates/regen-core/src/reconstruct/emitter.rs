//! Writes completed frame planes of the volume as numbered image files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::consts::FRAME_FILE_PREFIX;
use crate::error::{RegenError, Result};
use crate::frame::ChannelLayout;
use crate::io::image_io::{save_plane, OutputFormat};
use crate::volume::ScratchVolume;

use super::config::EmitConfig;
use super::types::{CancelToken, ProgressReporter, ReconstructStage};

/// Digits needed so that every index below `total` sorts lexically in order.
pub fn index_digits(total: usize, min_digits: usize) -> usize {
    let last = total.saturating_sub(1);
    let digits = last.checked_ilog10().map_or(1, |d| d as usize + 1);
    digits.max(min_digits)
}

/// File name of frame `index` in a sequence of `total` frames.
pub fn frame_file_name(
    index: usize,
    total: usize,
    min_digits: usize,
    format: OutputFormat,
) -> String {
    let width = index_digits(total, min_digits);
    format!("{FRAME_FILE_PREFIX}{index:0width$}.{}", format.extension())
}

/// Emits frames of a fully populated volume in ascending index order.
pub struct FrameImageEmitter<'a> {
    output_dir: &'a Path,
    config: &'a EmitConfig,
    layout: ChannelLayout,
}

impl<'a> FrameImageEmitter<'a> {
    pub fn new(output_dir: &'a Path, config: &'a EmitConfig, layout: ChannelLayout) -> Self {
        Self {
            output_dir,
            config,
            layout,
        }
    }

    /// Write every frame of `volume`, returning the paths in frame order.
    ///
    /// The first encode or write failure stops emission; frames already on
    /// disk are kept. Cancellation removes the frames this call wrote.
    pub fn emit(
        &self,
        volume: &ScratchVolume,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<Vec<PathBuf>> {
        let shape = volume.shape();
        if shape.channels != self.layout.channels() {
            return Err(RegenError::InvalidConfig(format!(
                "volume has {} channels, {:?} layout needs {}",
                shape.channels,
                self.layout,
                self.layout.channels()
            )));
        }

        let created_dir = !self.output_dir.exists();
        fs::create_dir_all(self.output_dir).map_err(|e| RegenError::EncodeWrite {
            path: self.output_dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (width, height) = (shape.width as u32, shape.height as u32);
        let mut written = Vec::with_capacity(shape.frames);
        reporter.begin_stage(ReconstructStage::Emitting, Some(shape.frames));

        for index in 0..shape.frames {
            if cancel.is_cancelled() {
                self.discard(&written, created_dir);
                return Err(RegenError::Cancelled);
            }

            let name = frame_file_name(
                index,
                shape.frames,
                self.config.min_index_digits,
                self.config.format,
            );
            let path = self.output_dir.join(name);
            let plane = volume.frame_bytes(index)?;
            save_plane(plane, width, height, self.layout, self.config.format, &path)?;

            debug!(frame = index, path = %path.display(), "Saved frame");
            written.push(path);
            reporter.advance(index + 1);
        }

        reporter.finish_stage();
        Ok(written)
    }

    /// Best-effort removal of frames written before a cancellation.
    fn discard(&self, written: &[PathBuf], created_dir: bool) {
        for path in written {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Could not remove partial frame");
            }
        }
        if created_dir {
            // Only succeeds when the directory is empty.
            let _ = fs::remove_dir(self.output_dir);
        }
    }
}
