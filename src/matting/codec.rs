use super::tensor::TensorBuffer;
use super::types::{ChannelMode, FramePixels};
use crate::error::{MattingError, Result};
use image::{imageops, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use ndarray::{Array4, ArrayViewD, Ix4};

/// Filter shared by encode and decode so a same-size round trip is lossless
const RESAMPLE_FILTER: imageops::FilterType = imageops::FilterType::Triangle;

/// Converts between 8-bit frames and NCHW float tensors
pub struct ImageCodec {
    target_width: u32,
    target_height: u32,
}

impl ImageCodec {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Encode a frame into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to the model input size
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Lay out planar: all red, then all green, then all blue
    ///
    /// Returns: tensor with shape [1, 3, height, width]
    pub fn encode(&self, image: &FramePixels) -> Result<TensorBuffer> {
        let _span = tracing::debug_span!("encode").entered();

        image.validate()?;
        let resized = resample(image.to_rgb_image()?, self.target_width, self.target_height);

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        Ok(TensorBuffer::from(tensor))
    }

    /// Decode a [1, C, H, W] tensor into interleaved pixels at the target size
    ///
    /// Values are clamped to [0, 1] before quantization. `Rgb` accepts one
    /// plane (replicated to gray) or three; `Alpha` accepts exactly one.
    /// The pixels are copied out, the returned frame never borrows `tensor`.
    ///
    /// Unlike [`encode`](Self::encode) this is not tied to a codec: outputs
    /// only exist as borrowed views inside the backend's consumer, and they
    /// are decoded back to each frame's own resolution, not the model size.
    pub fn decode(
        tensor: &ArrayViewD<'_, f32>,
        target_width: u32,
        target_height: u32,
        mode: ChannelMode,
    ) -> Result<FramePixels> {
        let _span = tracing::debug_span!("decode", ?mode).entered();

        let shape = tensor.shape();
        if shape.len() != 4 {
            return Err(MattingError::UnsupportedChannelLayout(format!(
                "expected a rank 4 NCHW tensor, got shape {shape:?}"
            )));
        }
        let (batch, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
        if batch != 1 || height == 0 || width == 0 {
            return Err(MattingError::UnsupportedChannelLayout(format!(
                "expected a single non-empty image, got shape {shape:?}"
            )));
        }
        match (mode, channels) {
            (ChannelMode::Rgb, 1 | 3) | (ChannelMode::Alpha, 1) => {}
            _ => {
                return Err(MattingError::UnsupportedChannelLayout(format!(
                    "{channels} channels cannot be decoded as {mode:?}"
                )))
            }
        }

        let planes = tensor.view().into_dimensionality::<Ix4>()?;
        let (width, height) = (width as u32, height as u32);
        let sample = |c: usize, x: u32, y: u32| quantize(planes[[0, c, y as usize, x as usize]]);

        let frame = match mode {
            ChannelMode::Alpha => {
                let matte = GrayImage::from_fn(width, height, |x, y| Luma([sample(0, x, y)]));
                FramePixels::from(resample(matte, target_width, target_height))
            }
            ChannelMode::Rgb => {
                let last = channels - 1;
                let colour = RgbImage::from_fn(width, height, |x, y| {
                    Rgb([
                        sample(0, x, y),
                        sample(1.min(last), x, y),
                        sample(2.min(last), x, y),
                    ])
                });
                FramePixels::from(resample(colour, target_width, target_height))
            }
        };

        Ok(frame)
    }
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn resample<P>(image: ImageBuffer<P, Vec<u8>>, width: u32, height: u32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if image.dimensions() == (width, height) {
        return image;
    }
    imageops::resize(&image, width, height, RESAMPLE_FILTER)
}
