use crate::error::{MattingError, Result};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

/// 8-bit interleaved pixels owned by whoever produced the frame
///
/// `channels` is 1 (gray/alpha), 3 (RGB) or 4 (RGBA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePixels {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl FramePixels {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        let frame = Self {
            width,
            height,
            channels,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Check dimensions, channel count and buffer length agree
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MattingError::InvalidImage(format!(
                "empty image {}x{}",
                self.width, self.height
            )));
        }
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(MattingError::InvalidImage(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        let expected = self.pixel_count() * self.channels as usize;
        if self.data.len() != expected {
            return Err(MattingError::InvalidImage(format!(
                "buffer holds {} bytes, {}x{}x{} needs {}",
                self.data.len(),
                self.width,
                self.height,
                self.channels,
                expected
            )));
        }
        Ok(())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// View as an `image` crate buffer, copying the pixels
    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        self.validate()?;
        let (w, h, data) = (self.width, self.height, self.data.clone());
        let image = match self.channels {
            1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            _ => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        };
        image.ok_or_else(|| MattingError::InvalidImage("pixel buffer too small".to_string()))
    }

    /// RGB copy; gray is replicated and alpha is dropped
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        Ok(self.to_dynamic_image()?.to_rgb8())
    }
}

impl From<RgbImage> for FramePixels {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: 3,
            data: image.into_raw(),
        }
    }
}

impl From<GrayImage> for FramePixels {
    fn from(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: 1,
            data: image.into_raw(),
        }
    }
}

impl From<RgbaImage> for FramePixels {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: 4,
            data: image.into_raw(),
        }
    }
}

/// How a decoded tensor should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Three colour planes, or one plane replicated to gray
    Rgb,
    /// A single opacity plane
    Alpha,
}

/// Output of one processed frame, all at the input frame's resolution
///
/// `composite` carries the foreground colour with the alpha matte in its
/// fourth channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MattingResult {
    pub foreground: FramePixels,
    pub alpha: FramePixels,
    pub composite: FramePixels,
}
