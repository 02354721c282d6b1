#[allow(dead_code)]
mod common;

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use regen_core::error::RegenError;
use regen_core::frame::ChannelLayout;
use regen_core::io::image_io::OutputFormat;
use regen_core::reconstruct::config::ChannelInputs;
use regen_core::reconstruct::{
    run_job, run_job_reported, CancelToken, ProgressReporter, ReconstructStage,
};

use common::{BLUE_SEED, GREEN_SEED, RED_SEED};

#[test]
fn test_round_trip_2x2_two_frames() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    // Rows are pixels (row-major), columns are frames.
    let red = common::write_channel_csv(
        dir.path(),
        "r.csv",
        &[vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8]],
    );
    let green = common::write_channel_csv(
        dir.path(),
        "g.csv",
        &[vec![11, 12], vec![13, 14], vec![15, 16], vec![17, 18]],
    );
    let blue = common::write_channel_csv(
        dir.path(),
        "b.csv",
        &[vec![21, 22], vec![23, 24], vec![25, 26], vec![27, 28]],
    );
    let inputs = ChannelInputs::Color { red, green, blue };
    let output = dir.path().join("out");
    let config = common::job_config("rt", inputs, output.clone(), 2, 2, 3, scratch.path());

    let summary = run_job(&config).unwrap();
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.pixel_rows, 4);
    assert_eq!(summary.chunks, 2);
    assert_eq!(summary.layout, ChannelLayout::Bgr);
    assert_eq!(summary.samples_out_of_range, 0);
    assert_eq!(
        common::list_dir(&output),
        vec!["frame_0000.png", "frame_0001.png"]
    );

    for frame in 0..2u8 {
        let img = image::open(&summary.images[frame as usize])
            .unwrap()
            .to_rgb8();
        assert_eq!(img.dimensions(), (2, 2));
        for pixel in 0..4u8 {
            let (x, y) = ((pixel % 2) as u32, (pixel / 2) as u32);
            let base = pixel * 2 + 1 + frame;
            assert_eq!(
                img.get_pixel(x, y).0,
                [base, base + 10, base + 20],
                "frame {frame} pixel {pixel}"
            );
        }
    }
}

#[test]
fn test_emits_exactly_one_file_per_frame() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let (width, height, frames) = (5u32, 3u32, 12usize);
    let inputs = common::write_color_set(dir.path(), "og", (width * height) as usize, frames);
    let output = dir.path().join("frames");
    let config = common::job_config("og", inputs, output.clone(), width, height, 4, scratch.path());

    let summary = run_job(&config).unwrap();
    let expected: Vec<String> = (0..frames).map(|i| format!("frame_{i:04}.png")).collect();
    assert_eq!(common::list_dir(&output), expected);
    assert_eq!(summary.images.len(), frames);
    for (i, path) in summary.images.iter().enumerate() {
        assert_eq!(path.file_name().unwrap().to_string_lossy(), expected[i]);
    }

    // Spot-check channel placement across the whole volume.
    let img = image::open(&summary.images[7]).unwrap().to_rgb8();
    let pixel = 11;
    let (x, y) = (pixel % width as usize, pixel / width as usize);
    assert_eq!(
        img.get_pixel(x as u32, y as u32).0,
        [
            common::sample(RED_SEED, pixel, 7),
            common::sample(GREEN_SEED, pixel, 7),
            common::sample(BLUE_SEED, pixel, 7),
        ]
    );
}

#[test]
fn test_chunk_size_does_not_change_output() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let (width, height, frames) = (6u32, 4u32, 5usize);
    let pixels = (width * height) as usize;
    let inputs = common::write_color_set(dir.path(), "fg", pixels, frames);

    let one = dir.path().join("chunk_one");
    let all = dir.path().join("chunk_all");
    let by_row = common::job_config(
        "one",
        inputs.clone(),
        one.clone(),
        width,
        height,
        1,
        scratch.path(),
    );
    let whole = common::job_config(
        "all",
        inputs,
        all.clone(),
        width,
        height,
        pixels,
        scratch.path(),
    );

    let a = run_job(&by_row).unwrap();
    let b = run_job(&whole).unwrap();
    assert_eq!(a.chunks, pixels);
    assert_eq!(b.chunks, 1);

    assert_eq!(common::list_dir(&one), common::list_dir(&all));
    for (pa, pb) in a.images.iter().zip(&b.images) {
        assert_eq!(fs::read(pa).unwrap(), fs::read(pb).unwrap());
    }
}

#[test]
fn test_short_channel_fails_before_any_image() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let pixels = 6;
    let red = common::write_channel_csv(dir.path(), "r.csv", &common::channel_rows(1, pixels, 2));
    let green = common::write_channel_csv(
        dir.path(),
        "g.csv",
        &common::channel_rows(2, pixels - 1, 2),
    );
    let blue = common::write_channel_csv(dir.path(), "b.csv", &common::channel_rows(3, pixels, 2));
    let inputs = ChannelInputs::Color { red, green, blue };

    for chunk_size in [1, 4, pixels] {
        let output = dir.path().join(format!("out_{chunk_size}"));
        let config = common::job_config(
            "short",
            inputs.clone(),
            output.clone(),
            3,
            2,
            chunk_size,
            scratch.path(),
        );
        let result = run_job(&config);
        assert!(
            matches!(result, Err(RegenError::ChannelAlignment(_))),
            "chunk {chunk_size}: {result:?}"
        );
        assert!(common::list_dir(&output).is_empty());
    }
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_all_channels_short_is_pixel_mismatch() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "x", 5, 2);
    let output = dir.path().join("out");
    let config = common::job_config("x", inputs, output.clone(), 3, 2, 2, scratch.path());

    assert!(matches!(
        run_job(&config),
        Err(RegenError::PixelCountMismatch {
            expected: 6,
            actual: 5
        })
    ));
    assert!(common::list_dir(&output).is_empty());
}

#[test]
fn test_too_many_rows_is_pixel_mismatch() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "x", 8, 2);
    let config = common::job_config("x", inputs, dir.path().join("out"), 3, 2, 4, scratch.path());

    assert!(matches!(
        run_job(&config),
        Err(RegenError::PixelCountMismatch { expected: 6, .. })
    ));
}

#[test]
fn test_frame_count_mismatch_is_alignment_error() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let red = common::write_channel_csv(dir.path(), "r.csv", &common::channel_rows(1, 4, 3));
    let green = common::write_channel_csv(dir.path(), "g.csv", &common::channel_rows(2, 4, 2));
    let blue = common::write_channel_csv(dir.path(), "b.csv", &common::channel_rows(3, 4, 3));
    let inputs = ChannelInputs::Color { red, green, blue };
    let config = common::job_config("fc", inputs, dir.path().join("out"), 2, 2, 4, scratch.path());

    assert!(matches!(
        run_job(&config),
        Err(RegenError::ChannelAlignment(_))
    ));
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = ChannelInputs::Color {
        red: dir.path().join("r.csv"),
        green: dir.path().join("g.csv"),
        blue: dir.path().join("b.csv"),
    };
    let output = dir.path().join("out");
    let config = common::job_config("none", inputs, output, 2, 2, 4, scratch.path());

    match run_job(&config) {
        Err(RegenError::MissingInputFile { path }) => assert!(path.ends_with("r.csv")),
        other => panic!("expected MissingInputFile, got {other:?}"),
    }
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_malformed_row_aborts_and_cleans_scratch() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "m", 6, 2);
    if let ChannelInputs::Color { ref blue, .. } = inputs {
        fs::write(
            blue,
            "pixel_index,frame_0,frame_1\n0,1,2\n1,3,4\n2,5,6\n3,x,8\n4,9,10\n5,11,12\n",
        )
        .unwrap();
    }
    let output = dir.path().join("out");
    let config = common::job_config("m", inputs, output.clone(), 3, 2, 2, scratch.path());

    assert!(matches!(
        run_job(&config),
        Err(RegenError::MalformedRow { line: 5, .. })
    ));
    assert!(common::list_dir(&output).is_empty());
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_no_scratch_left_after_success() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "s", 4, 3);
    let config = common::job_config("s", inputs, dir.path().join("out"), 2, 2, 2, scratch.path());

    run_job(&config).unwrap();
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_grayscale_job() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let (width, height, frames) = (4u32, 3u32, 3usize);
    let pixels = (width * height) as usize;
    let rows = common::channel_rows(5, pixels, frames);
    let gray = common::write_channel_csv(dir.path(), "gray.csv", &rows);
    let output = dir.path().join("gray");
    let config = common::job_config(
        "gray",
        ChannelInputs::Mono { gray },
        output.clone(),
        width,
        height,
        5,
        scratch.path(),
    );

    let summary = run_job(&config).unwrap();
    assert_eq!(summary.layout, ChannelLayout::Mono);
    assert_eq!(common::list_dir(&output).len(), frames);

    let img = image::open(&summary.images[2]).unwrap();
    assert_eq!(img.color(), image::ColorType::L8);
    let gray = img.to_luma8();
    for pixel in 0..pixels {
        let (x, y) = ((pixel % width as usize) as u32, (pixel / width as usize) as u32);
        assert_eq!(gray.get_pixel(x, y).0[0], common::sample(5, pixel, 2));
    }
}

#[test]
fn test_tiff_output_and_wide_index() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "t", 4, 3);
    let output = dir.path().join("tiff");
    let mut config = common::job_config("t", inputs, output.clone(), 2, 2, 4, scratch.path());
    config.emit.format = OutputFormat::Tiff;
    config.emit.min_index_digits = 6;

    run_job(&config).unwrap();
    assert_eq!(
        common::list_dir(&output),
        vec!["frame_000000.tiff", "frame_000001.tiff", "frame_000002.tiff"]
    );
}

#[test]
fn test_clamped_samples_are_counted() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let red = common::write_channel_csv(dir.path(), "r.csv", &[vec![300], vec![-5]]);
    let green = common::write_channel_csv(dir.path(), "g.csv", &[vec![1], vec![2]]);
    let blue = common::write_channel_csv(dir.path(), "b.csv", &[vec![3], vec![4]]);
    let inputs = ChannelInputs::Color { red, green, blue };
    let config = common::job_config("c", inputs, dir.path().join("out"), 2, 1, 8, scratch.path());

    let summary = run_job(&config).unwrap();
    assert_eq!(summary.samples_out_of_range, 2);
    let img = image::open(&summary.images[0]).unwrap().to_rgb8();
    assert_eq!(img.get_pixel(0, 0).0, [255, 1, 3]);
    assert_eq!(img.get_pixel(1, 0).0, [0, 2, 4]);
}

#[test]
fn test_encode_failure_keeps_earlier_frames() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "e", 4, 4);
    let output = dir.path().join("out");
    // A directory squatting on frame 2's file name makes that write fail.
    fs::create_dir_all(output.join("frame_0002.png")).unwrap();
    let config = common::job_config("e", inputs, output.clone(), 2, 2, 4, scratch.path());

    assert!(matches!(
        run_job(&config),
        Err(RegenError::EncodeWrite { .. })
    ));
    assert_eq!(
        common::list_dir(&output),
        vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]
    );
    assert!(!output.join("frame_0003.png").exists());
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_cancel_before_start() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "c", 4, 2);
    let output = dir.path().join("out");
    let config = common::job_config("c", inputs, output.clone(), 2, 2, 1, scratch.path());

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = run_job_reported(&config, Arc::new(CancelAfter::never(cancel.clone())), &cancel);
    assert!(matches!(result, Err(RegenError::Cancelled)));
    assert!(!output.exists());
    assert!(common::list_dir(scratch.path()).is_empty());
}

/// Cancels its token once `trigger` items of `stage` are done.
struct CancelAfter {
    token: CancelToken,
    stage: Option<ReconstructStage>,
    trigger: usize,
    current: std::sync::Mutex<Option<ReconstructStage>>,
}

impl CancelAfter {
    fn new(token: CancelToken, stage: ReconstructStage, trigger: usize) -> Self {
        Self {
            token,
            stage: Some(stage),
            trigger,
            current: std::sync::Mutex::new(None),
        }
    }

    fn never(token: CancelToken) -> Self {
        Self {
            token,
            stage: None,
            trigger: 0,
            current: std::sync::Mutex::new(None),
        }
    }
}

impl ProgressReporter for CancelAfter {
    fn begin_stage(&self, stage: ReconstructStage, _total_items: Option<usize>) {
        *self.current.lock().unwrap() = Some(stage);
    }

    fn advance(&self, items_done: usize) {
        let current = *self.current.lock().unwrap();
        if current.is_some() && current == self.stage && items_done >= self.trigger {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancel_during_sync_cleans_scratch() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "c", 6, 2);
    let output = dir.path().join("out");
    let config = common::job_config("c", inputs, output.clone(), 3, 2, 1, scratch.path());

    let cancel = CancelToken::new();
    let reporter = CancelAfter::new(cancel.clone(), ReconstructStage::Synchronizing, 2);
    let result = run_job_reported(&config, Arc::new(reporter), &cancel);

    assert!(matches!(result, Err(RegenError::Cancelled)));
    assert!(!output.exists());
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_cancel_during_emission_removes_partial_output() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "c", 4, 5);
    let output = dir.path().join("out");
    let config = common::job_config("c", inputs, output.clone(), 2, 2, 4, scratch.path());

    let cancel = CancelToken::new();
    let reporter = CancelAfter::new(cancel.clone(), ReconstructStage::Emitting, 2);
    let result = run_job_reported(&config, Arc::new(reporter), &cancel);

    assert!(matches!(result, Err(RegenError::Cancelled)));
    assert!(!output.exists());
    assert!(common::list_dir(scratch.path()).is_empty());
}

#[test]
fn test_cancel_keeps_preexisting_output_dir() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "c", 4, 5);
    let output = dir.path().join("out");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("notes.txt"), "keep").unwrap();
    let config = common::job_config("c", inputs, output.clone(), 2, 2, 4, scratch.path());

    let cancel = CancelToken::new();
    let reporter = CancelAfter::new(cancel.clone(), ReconstructStage::Emitting, 1);
    let result = run_job_reported(&config, Arc::new(reporter), &cancel);

    assert!(matches!(result, Err(RegenError::Cancelled)));
    assert_eq!(common::list_dir(&output), vec!["notes.txt"]);
}

#[test]
fn test_invalid_geometry_is_rejected() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let inputs = common::write_color_set(dir.path(), "g", 4, 2);
    let config = common::job_config("g", inputs, dir.path().join("out"), 0, 2, 4, scratch.path());
    assert!(matches!(
        run_job(&config),
        Err(RegenError::InvalidDimensions { width: 0, height: 2 })
    ));
}
