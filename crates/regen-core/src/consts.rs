/// Default number of pixel rows read per synchronized chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Default frame dimensions of the full-resolution pipeline.
pub const DEFAULT_FRAME_WIDTH: u32 = 1920;
pub const DEFAULT_FRAME_HEIGHT: u32 = 1080;

/// Minimum number of digits in an emitted frame index (`frame_0000.png`).
pub const DEFAULT_MIN_INDEX_DIGITS: usize = 4;

/// Field delimiter of the columnar channel files.
pub const DEFAULT_DELIMITER: char = ',';

/// Number of channel slots in a color volume (B, G, R).
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Minimum rows in a chunk before line parsing fans out over Rayon.
pub const PARALLEL_ROW_THRESHOLD: usize = 4_096;

/// Minimum samples (rows * frames) in a chunk before the transposed volume
/// write fans out over Rayon.
pub const PARALLEL_SAMPLE_THRESHOLD: usize = 65_536;

/// Block size used when zero-filling a preallocated scratch volume.
pub const PREALLOCATE_BLOCK_BYTES: usize = 1 << 20;

/// Prefix of the per-job scratch directory.
pub const SCRATCH_DIR_PREFIX: &str = "regen-volume-";

/// Name of the backing file inside the scratch directory.
pub const SCRATCH_FILE_NAME: &str = "video_volume.dat";

/// Prefix of every emitted frame file.
pub const FRAME_FILE_PREFIX: &str = "frame_";
