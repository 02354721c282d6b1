use std::fmt;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;

use image::{GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{RegenError, Result};
use crate::frame::ChannelLayout;

/// Raster format of emitted frame files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Tiff,
    Bmp,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Tiff => ImageFormat::Tiff,
            Self::Bmp => ImageFormat::Bmp,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => write!(f, "PNG"),
            Self::Tiff => write!(f, "TIFF"),
            Self::Bmp => write!(f, "BMP"),
        }
    }
}

/// Encode one `[height][width][channel]` plane into an in-memory image file.
///
/// BGR planes are swizzled to RGB, the `image` crate's channel order.
pub fn encode_plane(
    plane: &[u8],
    width: u32,
    height: u32,
    layout: ChannelLayout,
    format: OutputFormat,
) -> Result<Vec<u8>> {
    let mut encoded = Vec::new();
    let mut cursor = Cursor::new(&mut encoded);

    match layout {
        ChannelLayout::Bgr => {
            let mut rgb = Vec::with_capacity(plane.len());
            for bgr in plane.chunks_exact(3) {
                rgb.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
            }
            let img = RgbImage::from_raw(width, height, rgb)
                .ok_or(RegenError::InvalidDimensions { width, height })?;
            img.write_to(&mut cursor, format.image_format())?;
        }
        ChannelLayout::Mono => {
            let img = GrayImage::from_raw(width, height, plane.to_vec())
                .ok_or(RegenError::InvalidDimensions { width, height })?;
            img.write_to(&mut cursor, format.image_format())?;
        }
    }

    Ok(encoded)
}

/// Encode a plane and write it to `path` in one call.
///
/// A failed write removes whatever part of the file reached the disk. A file
/// that could not be opened is left untouched.
pub fn save_plane(
    plane: &[u8],
    width: u32,
    height: u32,
    layout: ChannelLayout,
    format: OutputFormat,
    path: &Path,
) -> Result<()> {
    let encode_write = |reason: String| RegenError::EncodeWrite {
        path: path.to_path_buf(),
        reason,
    };

    let encoded = encode_plane(plane, width, height, layout, format)
        .map_err(|e| encode_write(e.to_string()))?;

    let mut file = File::create(path).map_err(|e| encode_write(e.to_string()))?;
    if let Err(e) = file.write_all(&encoded).and_then(|()| file.flush()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(encode_write(e.to_string()));
    }
    Ok(())
}
