use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use regen_core::consts::DEFAULT_DELIMITER;
use regen_core::frame::FrameGeometry;
use regen_core::io::channel_reader::inspect_channel_file;

#[derive(Args)]
pub struct InfoArgs {
    /// Channel files to inspect
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Field delimiter
    #[arg(long, default_value_t = DEFAULT_DELIMITER)]
    pub delimiter: char,

    /// Expected frame width; with --height, checks each file's row count
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Expected frame height
    #[arg(long, requires = "width")]
    pub height: Option<u32>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let geometry = match (args.width, args.height) {
        (Some(width), Some(height)) => Some(FrameGeometry { width, height }),
        _ => None,
    };

    let mut frame_counts = Vec::with_capacity(args.files.len());
    let mut mismatched = 0;
    for path in &args.files {
        let info = inspect_channel_file(path, args.delimiter)?;

        println!("File:        {}", info.path.display());
        println!("Frames:      {}", info.frames);
        println!("Pixel rows:  {}", info.rows);
        println!(
            "Data size:   {:.1} MB",
            info.bytes as f64 / (1024.0 * 1024.0)
        );
        if let Some(geometry) = geometry {
            let expected = geometry.pixel_count();
            if info.rows == expected {
                println!("Geometry:    {}x{} OK", geometry.width, geometry.height);
            } else {
                println!(
                    "Geometry:    {}x{} needs {} rows, file has {}",
                    geometry.width, geometry.height, expected, info.rows
                );
                mismatched += 1;
            }
        }
        println!();
        frame_counts.push(info.frames);
    }

    if frame_counts.windows(2).any(|w| w[0] != w[1]) {
        bail!("Channel files disagree on frame count: {:?}", frame_counts);
    }
    if mismatched > 0 {
        bail!("{mismatched} file(s) do not match the requested geometry");
    }
    Ok(())
}
