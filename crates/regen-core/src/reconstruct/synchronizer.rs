//! Lockstep reading of the channel files into the scratch volume.

use tracing::debug;

use crate::error::{RegenError, Result};
use crate::frame::{ChannelLayout, ChannelSource};
use crate::io::channel_reader::{ChannelBatch, ChannelStreamReader};
use crate::volume::ScratchVolume;

use super::config::{ChannelInputs, ReaderConfig};
use super::types::{CancelToken, ProgressReporter, ReconstructStage};

/// One channel file bound to its slot in the volume.
pub struct ChannelStream {
    pub source: ChannelSource,
    pub slot: usize,
    pub reader: ChannelStreamReader,
}

/// Counters gathered while synchronizing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub pixel_rows: usize,
    pub chunks: usize,
    pub samples_out_of_range: u64,
}

/// Drives every channel reader in lockstep and interleaves their batches
/// into the volume.
pub struct Synchronizer {
    streams: Vec<ChannelStream>,
    chunk_size: usize,
}

impl Synchronizer {
    /// Bind already-open streams. All streams must report the same frame count.
    pub fn new(streams: Vec<ChannelStream>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RegenError::InvalidConfig("chunk_size must be > 0".into()));
        }
        let Some(first) = streams.first() else {
            return Err(RegenError::InvalidConfig("no channel streams".into()));
        };

        let frames = first.reader.frame_count();
        if let Some(other) = streams.iter().find(|s| s.reader.frame_count() != frames) {
            return Err(RegenError::ChannelAlignment(format!(
                "{} channel has {} frames, {} channel has {}",
                first.source,
                frames,
                other.source,
                other.reader.frame_count()
            )));
        }

        Ok(Self {
            streams,
            chunk_size,
        })
    }

    /// Open every input of `inputs` and bind it to its layout slot.
    pub fn open(inputs: &ChannelInputs, config: &ReaderConfig) -> Result<Self> {
        let layout: ChannelLayout = inputs.layout();
        let streams = inputs
            .sources()
            .into_iter()
            .map(|(source, path)| {
                Ok(ChannelStream {
                    source,
                    slot: layout.slot(source)?,
                    reader: ChannelStreamReader::open_with(
                        path,
                        config.delimiter,
                        config.sample_policy,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(streams, config.chunk_size)
    }

    pub fn frame_count(&self) -> usize {
        self.streams
            .first()
            .map(|s| s.reader.frame_count())
            .unwrap_or(0)
    }

    /// Fill `volume` from the streams, one chunk at a time.
    ///
    /// Every iteration pulls one batch per stream and refuses to write unless
    /// all batches have the same row count. A stream ending while another
    /// still yields data is an alignment error, as is a total row count that
    /// differs from the volume's `height * width`.
    pub fn run(
        &mut self,
        volume: &mut ScratchVolume,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<SyncStats> {
        let shape = volume.shape();
        if shape.frames != self.frame_count() {
            return Err(RegenError::ChannelAlignment(format!(
                "volume holds {} frames, channel files hold {}",
                shape.frames,
                self.frame_count()
            )));
        }

        let total_rows = shape.pixels_per_frame();
        let chunk_size = self.chunk_size;
        let mut stats = SyncStats::default();
        reporter.begin_stage(ReconstructStage::Synchronizing, Some(total_rows));

        loop {
            cancel.check()?;

            let batches = self
                .streams
                .iter_mut()
                .map(|s| s.reader.next_batch(chunk_size))
                .collect::<Result<Vec<Option<ChannelBatch>>>>()?;

            if batches.iter().all(Option::is_none) {
                break;
            }
            let batches = self.aligned(batches, stats.pixel_rows)?;

            let rows = batches[0].rows();
            let offset = stats.pixel_rows;
            if offset + rows > total_rows {
                return Err(RegenError::PixelCountMismatch {
                    expected: total_rows,
                    actual: offset + rows,
                });
            }

            for (stream, batch) in self.streams.iter().zip(&batches) {
                volume.write_channel_rows(stream.slot, offset, batch.data.view())?;
                stats.samples_out_of_range += batch.out_of_range as u64;
            }

            stats.pixel_rows += rows;
            stats.chunks += 1;
            debug!(
                chunk = stats.chunks,
                rows,
                processed = stats.pixel_rows,
                total = total_rows,
                "Wrote chunk"
            );
            reporter.advance(stats.pixel_rows);
        }

        if stats.pixel_rows != total_rows {
            return Err(RegenError::PixelCountMismatch {
                expected: total_rows,
                actual: stats.pixel_rows,
            });
        }

        reporter.finish_stage();
        Ok(stats)
    }

    /// Unwrap one iteration's batches, failing unless every stream produced
    /// a batch of the same length.
    fn aligned(
        &self,
        batches: Vec<Option<ChannelBatch>>,
        offset: usize,
    ) -> Result<Vec<ChannelBatch>> {
        if let Some(ended) = batches.iter().position(Option::is_none) {
            let live: Vec<String> = self
                .streams
                .iter()
                .zip(&batches)
                .filter(|(_, b)| b.is_some())
                .map(|(s, _)| s.source.to_string())
                .collect();
            return Err(RegenError::ChannelAlignment(format!(
                "{} channel ended after {offset} rows while {} still had data",
                self.streams[ended].source,
                live.join(", ")
            )));
        }

        let batches: Vec<ChannelBatch> = batches.into_iter().flatten().collect();
        let rows = batches[0].rows();
        if let Some(i) = batches.iter().position(|b| b.rows() != rows) {
            return Err(RegenError::ChannelAlignment(format!(
                "chunk at row {offset}: {} channel yielded {rows} rows, {} channel yielded {}",
                self.streams[0].source,
                self.streams[i].source,
                batches[i].rows()
            )));
        }
        Ok(batches)
    }
}
