//! Disk-backed scratch storage for the reconstructed video volume.
//!
//! The volume is a dense `[frame][row][col][channel]` u8 array living in a
//! memory-mapped file inside a private temporary directory. Pages are only
//! resident while touched, so the whole volume never has to fit in RAM.
//! Dropping the handle unmaps the file and removes the directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use ndarray::{s, ArrayView2, ArrayView3, ArrayView4, ArrayViewMut3, ArrayViewMut4, Zip};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::consts::{
    PARALLEL_SAMPLE_THRESHOLD, PREALLOCATE_BLOCK_BYTES, SCRATCH_DIR_PREFIX, SCRATCH_FILE_NAME,
};
use crate::error::{RegenError, Result};
use crate::frame::VolumeShape;
use crate::reconstruct::config::ScratchConfig;

/// Zero-initialised, memory-mapped video volume.
pub struct ScratchVolume {
    shape: VolumeShape,
    path: PathBuf,
    mmap: Option<MmapMut>,
    dir: Option<TempDir>,
}

impl ScratchVolume {
    /// Create the scratch directory and a zero-filled backing file of
    /// `frames * height * width * channels` bytes.
    pub fn acquire(shape: VolumeShape, config: &ScratchConfig) -> Result<Self> {
        if shape.frames == 0 || shape.height == 0 || shape.width == 0 || shape.channels == 0 {
            return Err(RegenError::InvalidConfig(format!(
                "cannot allocate an empty volume ({}x{}x{}x{})",
                shape.frames, shape.height, shape.width, shape.channels
            )));
        }
        let len = shape.byte_len()?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_DIR_PREFIX);
        let dir = match &config.dir {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| RegenError::Allocation {
            path: config.dir.clone().unwrap_or_else(std::env::temp_dir),
            source,
        })?;

        let path = dir.path().join(SCRATCH_FILE_NAME);
        let err_path = path.clone();
        let alloc_err = move |source: std::io::Error| RegenError::Allocation {
            path: err_path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(&alloc_err)?;
        if config.preallocate {
            zero_fill(&file, len)
                .and_then(|()| file.sync_all())
                .map_err(&alloc_err)?;
        } else {
            file.set_len(len as u64).map_err(&alloc_err)?;
        }
        // The backing file sits in a private directory nothing else writes to.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(&alloc_err)?;

        debug!(
            path = %path.display(),
            bytes = len,
            preallocated = config.preallocate,
            "Allocated scratch volume"
        );

        Ok(Self {
            shape,
            path,
            mmap: Some(mmap),
            dir: Some(dir),
        })
    }

    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or_default()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.mmap.as_deref_mut().unwrap_or_default()
    }

    /// Full `[frame][row][col][channel]` view.
    pub fn view(&self) -> Result<ArrayView4<'_, u8>> {
        let VolumeShape {
            frames,
            height,
            width,
            channels,
        } = self.shape;
        Ok(ArrayView4::from_shape(
            (frames, height, width, channels),
            self.bytes(),
        )?)
    }

    /// Full mutable `[frame][row][col][channel]` view.
    pub fn view_mut(&mut self) -> Result<ArrayViewMut4<'_, u8>> {
        let VolumeShape {
            frames,
            height,
            width,
            channels,
        } = self.shape;
        Ok(ArrayViewMut4::from_shape(
            (frames, height, width, channels),
            self.bytes_mut(),
        )?)
    }

    /// Raw bytes of one frame plane, laid out `[row][col][channel]`.
    pub fn frame_bytes(&self, frame: usize) -> Result<&[u8]> {
        if frame >= self.shape.frames {
            return Err(RegenError::InvalidConfig(format!(
                "frame {frame} out of range (total: {})",
                self.shape.frames
            )));
        }
        let size = self.shape.frame_bytes()?;
        let start = frame * size;
        Ok(&self.bytes()[start..start + size])
    }

    /// `[row][col][channel]` view of one frame plane.
    pub fn frame_plane(&self, frame: usize) -> Result<ArrayView3<'_, u8>> {
        let plane = self.frame_bytes(frame)?;
        Ok(ArrayView3::from_shape(
            (self.shape.height, self.shape.width, self.shape.channels),
            plane,
        )?)
    }

    /// Write a `(rows, frames)` batch of one channel into
    /// `[.., row_offset..row_offset + rows, channel]` of the pixel-flattened
    /// volume, transposing it to `[frame][pixel_row]` on the way.
    pub fn write_channel_rows(
        &mut self,
        channel: usize,
        row_offset: usize,
        rows: ArrayView2<'_, u8>,
    ) -> Result<()> {
        let shape = self.shape;
        if channel >= shape.channels {
            return Err(RegenError::InvalidConfig(format!(
                "channel slot {channel} out of range (channels: {})",
                shape.channels
            )));
        }

        let (batch_rows, batch_frames) = rows.dim();
        if batch_frames != shape.frames {
            return Err(RegenError::ChannelAlignment(format!(
                "batch has {batch_frames} frame columns, volume has {} frames",
                shape.frames
            )));
        }

        let pixels = shape.pixels_per_frame();
        let end = row_offset.saturating_add(batch_rows);
        if end > pixels {
            return Err(RegenError::PixelCountMismatch {
                expected: pixels,
                actual: end,
            });
        }

        let flat = ArrayViewMut3::from_shape(
            (shape.frames, pixels, shape.channels),
            self.bytes_mut(),
        )?;
        let mut target = flat.slice_move(s![.., row_offset..end, channel]);
        let source = rows.t();

        if batch_rows * batch_frames >= PARALLEL_SAMPLE_THRESHOLD {
            Zip::from(&mut target)
                .and(&source)
                .par_for_each(|dst, &src| *dst = src);
        } else {
            target.assign(&source);
        }
        Ok(())
    }

    /// Remove the backing storage now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ScratchVolume {
    fn drop(&mut self) {
        // Unmap before unlinking the backing file.
        drop(self.mmap.take());

        if let Some(dir) = self.dir.take() {
            let dir_path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %dir_path.display(), "Removed scratch volume"),
                Err(e) => warn!(
                    path = %dir_path.display(),
                    error = %e,
                    "Could not remove scratch volume"
                ),
            }
        }
    }
}

/// Write `len` zero bytes, forcing the filesystem to back every block.
fn zero_fill<W: Write>(mut writer: W, len: usize) -> std::io::Result<()> {
    let block = vec![0u8; PREALLOCATE_BLOCK_BYTES.min(len)];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(block.len());
        writer.write_all(&block[..n])?;
        remaining -= n;
    }
    writer.flush()
}
