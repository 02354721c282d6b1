use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{COLOR_CHANNEL_COUNT, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::error::{RegenError, Result};

/// Which color a columnar channel file carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelSource {
    Red,
    Green,
    Blue,
    Gray,
}

impl fmt::Display for ChannelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
            Self::Blue => write!(f, "blue"),
            Self::Gray => write!(f, "gray"),
        }
    }
}

/// Interleaving of channel slots inside each volume pixel.
///
/// Color volumes are stored B, G, R: slot 0 holds the blue source, slot 1
/// green and slot 2 red. The emitter swizzles back to RGB when encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelLayout {
    Bgr,
    Mono,
}

impl ChannelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Bgr => COLOR_CHANNEL_COUNT,
            Self::Mono => 1,
        }
    }

    /// Slot index a source channel is written to.
    pub fn slot(self, source: ChannelSource) -> Result<usize> {
        match (self, source) {
            (Self::Bgr, ChannelSource::Blue) => Ok(0),
            (Self::Bgr, ChannelSource::Green) => Ok(1),
            (Self::Bgr, ChannelSource::Red) => Ok(2),
            (Self::Mono, ChannelSource::Gray) => Ok(0),
            (layout, source) => Err(RegenError::InvalidConfig(format!(
                "{source} channel has no slot in a {layout:?} volume"
            ))),
        }
    }
}

/// Width and height of every reconstructed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl FrameGeometry {
    /// Pixel rows a channel file must hold (`width * height`).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Dimensions of a `[frame][row][col][channel]` u8 volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeShape {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl VolumeShape {
    pub fn new(frames: usize, geometry: FrameGeometry, layout: ChannelLayout) -> Self {
        Self {
            frames,
            height: geometry.height as usize,
            width: geometry.width as usize,
            channels: layout.channels(),
        }
    }

    pub fn pixels_per_frame(&self) -> usize {
        self.height * self.width
    }

    /// Bytes in one `[height][width][channel]` plane.
    pub fn frame_bytes(&self) -> Result<usize> {
        self.height
            .checked_mul(self.width)
            .and_then(|p| p.checked_mul(self.channels))
            .ok_or_else(|| self.overflow())
    }

    /// Total bytes of the volume.
    pub fn byte_len(&self) -> Result<usize> {
        self.frame_bytes()?
            .checked_mul(self.frames)
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> RegenError {
        RegenError::InvalidConfig(format!(
            "volume {}x{}x{}x{} overflows the address space",
            self.frames, self.height, self.width, self.channels
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_slots_are_reversed() {
        let layout = ChannelLayout::Bgr;
        assert_eq!(layout.slot(ChannelSource::Blue).unwrap(), 0);
        assert_eq!(layout.slot(ChannelSource::Green).unwrap(), 1);
        assert_eq!(layout.slot(ChannelSource::Red).unwrap(), 2);
        assert!(layout.slot(ChannelSource::Gray).is_err());
    }

    #[test]
    fn test_mono_has_single_slot() {
        assert_eq!(ChannelLayout::Mono.channels(), 1);
        assert_eq!(ChannelLayout::Mono.slot(ChannelSource::Gray).unwrap(), 0);
        assert!(ChannelLayout::Mono.slot(ChannelSource::Red).is_err());
    }

    #[test]
    fn test_volume_byte_len() {
        let shape = VolumeShape::new(
            5,
            FrameGeometry { width: 4, height: 3 },
            ChannelLayout::Bgr,
        );
        assert_eq!(shape.pixels_per_frame(), 12);
        assert_eq!(shape.frame_bytes().unwrap(), 36);
        assert_eq!(shape.byte_len().unwrap(), 180);
    }

    #[test]
    fn test_volume_byte_len_overflow() {
        let shape = VolumeShape {
            frames: usize::MAX,
            height: 2,
            width: 2,
            channels: 3,
        };
        assert!(shape.byte_len().is_err());
    }
}
