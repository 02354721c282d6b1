use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITER, DEFAULT_MIN_INDEX_DIGITS};
use crate::error::{RegenError, Result};
use crate::frame::{ChannelLayout, ChannelSource, FrameGeometry, VolumeShape};
use crate::io::channel_reader::SamplePolicy;
use crate::io::image_io::OutputFormat;

/// Columnar input files of one job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelInputs {
    Color {
        red: PathBuf,
        green: PathBuf,
        blue: PathBuf,
    },
    Mono {
        gray: PathBuf,
    },
}

impl ChannelInputs {
    pub fn layout(&self) -> ChannelLayout {
        match self {
            Self::Color { .. } => ChannelLayout::Bgr,
            Self::Mono { .. } => ChannelLayout::Mono,
        }
    }

    /// Input files paired with the channel they carry.
    pub fn sources(&self) -> Vec<(ChannelSource, &Path)> {
        match self {
            Self::Color { red, green, blue } => vec![
                (ChannelSource::Red, red.as_path()),
                (ChannelSource::Green, green.as_path()),
                (ChannelSource::Blue, blue.as_path()),
            ],
            Self::Mono { gray } => vec![(ChannelSource::Gray, gray.as_path())],
        }
    }

    /// First input file that does not exist.
    pub fn first_missing(&self) -> Option<&Path> {
        self.sources()
            .into_iter()
            .map(|(_, path)| path)
            .find(|path| !path.is_file())
    }
}

impl fmt::Display for ChannelInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Color { .. } => write!(f, "Color (B, G, R)"),
            Self::Mono { .. } => write!(f, "Grayscale"),
        }
    }
}

/// How channel files are read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Pixel rows per synchronized read.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub sample_policy: SamplePolicy,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            delimiter: DEFAULT_DELIMITER,
            sample_policy: SamplePolicy::default(),
        }
    }
}

/// How frames are written out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmitConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Frame indices are zero-padded to at least this many digits, and to
    /// more when the frame count needs it.
    #[serde(default = "default_min_index_digits")]
    pub min_index_digits: usize,
}

fn default_min_index_digits() -> usize {
    DEFAULT_MIN_INDEX_DIGITS
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            min_index_digits: DEFAULT_MIN_INDEX_DIGITS,
        }
    }
}

/// Where the scratch volume lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScratchConfig {
    /// Parent directory for the scratch volume. System temp dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Write zeros over the whole volume up-front so a full disk fails at
    /// allocation time. A sparse file skips that cost, but running out of
    /// space later faults the mapped write and kills the process.
    #[serde(default = "default_preallocate")]
    pub preallocate: bool,
}

fn default_preallocate() -> bool {
    true
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: None,
            preallocate: true,
        }
    }
}

/// One reconstruction job: a channel set to one output directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub inputs: ChannelInputs,
    pub output: PathBuf,
    pub geometry: FrameGeometry,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub emit: EmitConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
}

impl JobConfig {
    /// Reject configurations that cannot describe a valid volume.
    pub fn validate(&self) -> Result<()> {
        let FrameGeometry { width, height } = self.geometry;
        if width == 0 || height == 0 {
            return Err(RegenError::InvalidDimensions { width, height });
        }
        if self.reader.chunk_size == 0 {
            return Err(RegenError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if matches!(self.reader.delimiter, '"' | '\n' | '\r') {
            return Err(RegenError::InvalidConfig(format!(
                "{:?} cannot be used as a delimiter",
                self.reader.delimiter
            )));
        }
        // Catch overflowing geometries before any file is opened.
        VolumeShape::new(1, self.geometry, self.inputs.layout()).byte_len()?;
        Ok(())
    }
}

/// A job entry in a batch file; shares the batch-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub name: String,
    pub output: PathBuf,
    pub inputs: ChannelInputs,
}

/// Independent jobs sharing geometry, reader, emit and scratch settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub geometry: FrameGeometry,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub emit: EmitConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
    #[serde(default)]
    pub jobs: Vec<BatchJob>,
}

impl BatchConfig {
    /// Expand every batch entry into a standalone job.
    pub fn job_configs(&self) -> Vec<JobConfig> {
        self.jobs
            .iter()
            .map(|job| JobConfig {
                name: job.name.clone(),
                inputs: job.inputs.clone(),
                output: job.output.clone(),
                geometry: self.geometry,
                reader: self.reader.clone(),
                emit: self.emit.clone(),
                scratch: self.scratch.clone(),
            })
            .collect()
    }

    /// Background, foreground and original data sets of a decomposition run.
    pub fn template() -> Self {
        let color = |prefix: &str, r: &str, g: &str, b: &str| ChannelInputs::Color {
            red: PathBuf::from(format!("{prefix}{r}.csv")),
            green: PathBuf::from(format!("{prefix}{g}.csv")),
            blue: PathBuf::from(format!("{prefix}{b}.csv")),
        };
        Self {
            geometry: FrameGeometry::default(),
            reader: ReaderConfig::default(),
            emit: EmitConfig::default(),
            scratch: ScratchConfig::default(),
            jobs: vec![
                BatchJob {
                    name: "background".into(),
                    output: PathBuf::from("res/output_frames/output_background"),
                    inputs: color("background_output_", "r", "g", "b"),
                },
                BatchJob {
                    name: "foreground".into(),
                    output: PathBuf::from("res/output_frames/output_foreground"),
                    inputs: color("foreground_output_", "r", "g", "b"),
                },
                BatchJob {
                    name: "original".into(),
                    output: PathBuf::from("res/output_frames/output_og_frames"),
                    inputs: color("frames_", "R", "G", "B"),
                },
            ],
        }
    }
}
