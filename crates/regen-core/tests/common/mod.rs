use std::fs;
use std::path::{Path, PathBuf};

use regen_core::frame::FrameGeometry;
use regen_core::reconstruct::config::{
    ChannelInputs, EmitConfig, JobConfig, ReaderConfig, ScratchConfig,
};

/// Write a columnar channel file: header `pixel_index,frame_0,...` followed
/// by one row per pixel holding one value per frame.
pub fn write_channel_csv(dir: &Path, name: &str, rows: &[Vec<i64>]) -> PathBuf {
    let frames = rows.first().map(Vec::len).unwrap_or(0);
    let mut text = String::from("pixel_index");
    for f in 0..frames {
        text.push_str(&format!(",frame_{f}"));
    }
    text.push('\n');
    for (i, row) in rows.iter().enumerate() {
        text.push_str(&i.to_string());
        for v in row {
            text.push_str(&format!(",{v}"));
        }
        text.push('\n');
    }

    let path = dir.join(name);
    fs::write(&path, text).expect("write channel file");
    path
}

/// Deterministic sample for channel `seed`, pixel row `pixel`, frame `frame`.
pub fn sample(seed: usize, pixel: usize, frame: usize) -> u8 {
    ((seed * 53 + pixel * 7 + frame * 13) % 256) as u8
}

/// `pixels` rows of `frames` samples generated by `sample(seed, ..)`.
pub fn channel_rows(seed: usize, pixels: usize, frames: usize) -> Vec<Vec<i64>> {
    (0..pixels)
        .map(|p| (0..frames).map(|f| sample(seed, p, f) as i64).collect())
        .collect()
}

pub const RED_SEED: usize = 1;
pub const GREEN_SEED: usize = 2;
pub const BLUE_SEED: usize = 3;

/// Write red, green and blue files named `<prefix>_{r,g,b}.csv` and return
/// the matching inputs.
pub fn write_color_set(dir: &Path, prefix: &str, pixels: usize, frames: usize) -> ChannelInputs {
    ChannelInputs::Color {
        red: write_channel_csv(
            dir,
            &format!("{prefix}_r.csv"),
            &channel_rows(RED_SEED, pixels, frames),
        ),
        green: write_channel_csv(
            dir,
            &format!("{prefix}_g.csv"),
            &channel_rows(GREEN_SEED, pixels, frames),
        ),
        blue: write_channel_csv(
            dir,
            &format!("{prefix}_b.csv"),
            &channel_rows(BLUE_SEED, pixels, frames),
        ),
    }
}

/// Job config with scratch storage confined to `scratch`.
pub fn job_config(
    name: &str,
    inputs: ChannelInputs,
    output: PathBuf,
    width: u32,
    height: u32,
    chunk_size: usize,
    scratch: &Path,
) -> JobConfig {
    JobConfig {
        name: name.to_string(),
        inputs,
        output,
        geometry: FrameGeometry { width, height },
        reader: ReaderConfig {
            chunk_size,
            ..Default::default()
        },
        emit: EmitConfig::default(),
        scratch: ScratchConfig {
            dir: Some(scratch.to_path_buf()),
            preallocate: false,
        },
    }
}

/// Sorted file names inside `dir` (empty when the directory is absent).
pub fn list_dir(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
