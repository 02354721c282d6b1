use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use regen_core::consts::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITER, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
    DEFAULT_MIN_INDEX_DIGITS,
};
use regen_core::frame::FrameGeometry;
use regen_core::io::channel_reader::SamplePolicy;
use regen_core::io::image_io::OutputFormat;
use regen_core::reconstruct::config::{
    ChannelInputs, EmitConfig, JobConfig, ReaderConfig, ScratchConfig,
};
use regen_core::reconstruct::run_job_reported;

use crate::interrupt::ctrl_c_token;
use crate::progress::IndicatifReporter;
use crate::summary::{print_job_config, print_job_summary};

#[derive(Clone, ValueEnum)]
pub enum FormatArg {
    Png,
    Tiff,
    Bmp,
}

impl From<&FormatArg> for OutputFormat {
    fn from(arg: &FormatArg) -> Self {
        match arg {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Tiff => OutputFormat::Tiff,
            FormatArg::Bmp => OutputFormat::Bmp,
        }
    }
}

#[derive(Clone, ValueEnum)]
pub enum PolicyArg {
    Wrap,
    Clamp,
    Reject,
}

impl From<&PolicyArg> for SamplePolicy {
    fn from(arg: &PolicyArg) -> Self {
        match arg {
            PolicyArg::Wrap => SamplePolicy::Wrap,
            PolicyArg::Clamp => SamplePolicy::Clamp,
            PolicyArg::Reject => SamplePolicy::Reject,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Red channel file
    #[arg(long, requires_all = ["green", "blue"], conflicts_with = "gray")]
    pub red: Option<PathBuf>,

    /// Green channel file
    #[arg(long, requires_all = ["red", "blue"])]
    pub green: Option<PathBuf>,

    /// Blue channel file
    #[arg(long, requires_all = ["red", "green"])]
    pub blue: Option<PathBuf>,

    /// Single grayscale channel file (instead of --red/--green/--blue)
    #[arg(long, required_unless_present = "red")]
    pub gray: Option<PathBuf>,

    /// Output directory for frame images
    #[arg(short, long)]
    pub output: PathBuf,

    /// Frame width in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    pub width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    pub height: u32,

    /// Pixel rows read per channel per step
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Field delimiter
    #[arg(long, default_value_t = DEFAULT_DELIMITER)]
    pub delimiter: char,

    /// Handling of samples outside [0, 255]
    #[arg(long, value_enum, default_value = "clamp")]
    pub policy: PolicyArg,

    /// Image format of emitted frames
    #[arg(long, value_enum, default_value = "png")]
    pub format: FormatArg,

    /// Minimum digits in frame file indices
    #[arg(long, default_value_t = DEFAULT_MIN_INDEX_DIGITS)]
    pub min_digits: usize,

    /// Directory for the temporary frame volume (default: system temp dir)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Skip reserving the volume on disk up-front (faster start, but a full
    /// disk aborts the process mid-run)
    #[arg(long)]
    pub sparse: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = build_config_from_args(args)?;
    print_job_config(&config);

    let reporter = Arc::new(IndicatifReporter::new());
    let cancel = ctrl_c_token().context("Failed to install Ctrl-C handler")?;
    let summary = run_job_reported(&config, reporter, &cancel)?;

    print_job_summary(&summary);
    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> Result<JobConfig> {
    let inputs = match (&args.red, &args.green, &args.blue, &args.gray) {
        (Some(red), Some(green), Some(blue), None) => ChannelInputs::Color {
            red: red.clone(),
            green: green.clone(),
            blue: blue.clone(),
        },
        (None, None, None, Some(gray)) => ChannelInputs::Mono { gray: gray.clone() },
        _ => bail!("Pass either --red, --green and --blue, or --gray"),
    };

    let name = args
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frames".to_string());

    Ok(JobConfig {
        name,
        inputs,
        output: args.output.clone(),
        geometry: FrameGeometry {
            width: args.width,
            height: args.height,
        },
        reader: ReaderConfig {
            chunk_size: args.chunk_size,
            delimiter: args.delimiter,
            sample_policy: (&args.policy).into(),
        },
        emit: EmitConfig {
            format: (&args.format).into(),
            min_index_digits: args.min_digits,
        },
        scratch: ScratchConfig {
            dir: args.scratch_dir.clone(),
            preallocate: !args.sparse,
        },
    })
}
