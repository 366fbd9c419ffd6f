//! Camera frames and the preprocessing applied before landmark prediction.
//!
//! Frames arrive as planar YUV buffers. Only the luma plane is used: it is
//! extracted, rotated into display orientation and histogram-equalized.

use image::{imageops, GrayImage};
use log::debug;
use crate::error::{Error, Result};
use crate::region::Region;

/// Pixel layout of incoming frames, identified by Android `ImageFormat` codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Y plane followed by interleaved V/U.
    #[default]
    Nv21,
    /// Y plane followed by V and U planes.
    Yv12,
    /// Flexible 4:2:0, delivered contiguously with the Y plane first.
    Yuv420_888,
    /// A code this crate does not understand. Kept so it can be reported.
    Other(i32),
}

impl PixelFormat {
    pub const NV21_CODE: i32 = 17;
    pub const YV12_CODE: i32 = 842_094_169;
    pub const YUV_420_888_CODE: i32 = 35;

    pub fn from_code(code: i32) -> Self {
        match code {
            Self::NV21_CODE => Self::Nv21,
            Self::YV12_CODE => Self::Yv12,
            Self::YUV_420_888_CODE => Self::Yuv420_888,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Nv21 => Self::NV21_CODE,
            Self::Yv12 => Self::YV12_CODE,
            Self::Yuv420_888 => Self::YUV_420_888_CODE,
            Self::Other(code) => *code,
        }
    }
}

/// Orientation correction derived from a rotation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Hint `90`: transpose, then flip around both axes.
    Portrait,
    /// Hint `0`: mirror horizontally.
    LandscapeLeft,
    /// Hint `180`: flip vertically.
    LandscapeRight,
    /// Any other hint: use the frame as captured.
    Unchanged,
}

impl Orientation {
    pub fn from_hint(rotation: i32) -> Self {
        match rotation {
            90 => Self::Portrait,
            0 => Self::LandscapeLeft,
            180 => Self::LandscapeRight,
            _ => Self::Unchanged,
        }
    }

    pub fn apply(self, image: GrayImage) -> GrayImage {
        debug!("orientation: {:?}", self);
        match self {
            // transpose + flip(both) == flip_vertical(rotate90)
            Self::Portrait => imageops::flip_vertical(&imageops::rotate90(&image)),
            Self::LandscapeLeft => imageops::flip_horizontal(&image),
            Self::LandscapeRight => imageops::flip_vertical(&image),
            Self::Unchanged => image,
        }
    }
}

/// One camera frame plus the geometry needed to analyze it.
///
/// The buffer is borrowed for the duration of a single call.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub rotation: i32,
    pub width: i32,
    pub height: i32,
    pub region: Region,
}

impl<'a> Frame<'a> {
    pub fn new(data: &'a [u8], rotation: i32, width: i32, height: i32, region: Region) -> Self {
        Self {
            data,
            rotation,
            width,
            height,
            region,
        }
    }

    /// Minimum buffer length for a 4:2:0 frame of the given size.
    pub fn required_len(width: u32, height: u32) -> usize {
        width as usize * (height as usize + height as usize / 2)
    }

    /// Extract the luma plane as a grayscale image in capture orientation.
    pub fn luma(&self, format: PixelFormat) -> Result<GrayImage> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if let PixelFormat::Other(code) = format {
            return Err(Error::UnsupportedFormat(code));
        }

        let (width, height) = (self.width as u32, self.height as u32);
        let expected = Self::required_len(width, height);
        if self.data.len() < expected {
            return Err(Error::FrameTooSmall {
                expected,
                actual: self.data.len(),
            });
        }

        // All supported layouts start with a full-resolution Y plane.
        let plane = self.data[..width as usize * height as usize].to_vec();
        GrayImage::from_raw(width, height, plane).ok_or(Error::InvalidDimensions {
            width: self.width,
            height: self.height,
        })
    }
}

/// Spread intensities over the full range using the cumulative histogram.
///
/// An image with a single intensity is left unchanged.
pub fn equalize_histogram(image: &mut GrayImage) {
    let mut hist = [0usize; 256];
    for p in image.pixels() {
        hist[p.0[0] as usize] += 1;
    }

    let total: usize = hist.iter().sum();
    let Some(first) = hist.iter().position(|&count| count > 0) else {
        return;
    };
    if hist[first] == total {
        return;
    }

    let scale = 255.0 / (total - hist[first]) as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0usize;
    for (i, slot) in lut.iter_mut().enumerate().skip(first + 1) {
        sum += hist[i];
        *slot = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }

    for p in image.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
}
