use std::fmt;
use std::io::Cursor;

use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// Capture resolution in pixels. The camera is reconfigured to this size on
/// every capture, so motion sampling and snapshots can use different sizes.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Grayscale,
    Color,
}

/// A still image with explicit dimensions and color mode. Immutable once
/// captured; grayscale frames are single-channel, color frames RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    pub fn from_gray(image: GrayImage) -> Frame {
        Frame {
            image: DynamicImage::ImageLuma8(image),
        }
    }

    pub fn from_rgb(image: RgbImage) -> Frame {
        Frame {
            image: DynamicImage::ImageRgb8(image),
        }
    }

    /// Decodes a JPEG and converts it to the requested color mode.
    pub fn from_jpeg(bytes: &[u8], mode: ColorMode) -> Result<Frame, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(match mode {
            ColorMode::Grayscale => Frame::from_gray(decoded.to_luma8()),
            ColorMode::Color => Frame::from_rgb(decoded.to_rgb8()),
        })
    }

    /// The 10x10 near-blank image attached to startup and failure
    /// notifications, where no real snapshot exists yet.
    pub fn placeholder() -> Frame {
        Frame::from_gray(GrayImage::from_pixel(10, 10, Luma([1])))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn mode(&self) -> ColorMode {
        match self.image {
            DynamicImage::ImageLuma8(_) => ColorMode::Grayscale,
            _ => ColorMode::Color,
        }
    }

    /// Pixel data as a single-channel buffer, if this is a grayscale frame.
    pub fn as_luma8(&self) -> Option<&GrayImage> {
        self.image.as_luma8()
    }

    pub fn to_jpeg(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(90))?;
        Ok(bytes)
    }
}
