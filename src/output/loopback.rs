use super::OutputSink;
use anyhow::{Context, Result};
use image::imageops;
use matte_stream::FramePixels;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// Writes YUYV frames to a v4l2loopback device
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;
        let format = device
            .set_format(&Format::new(width, height, FourCC::new(b"YUYV")))
            .context("Failed to set YUYV output format")?;
        tracing::debug!(
            "Loopback format: {}x{} {}",
            format.width,
            format.height,
            format.fourcc
        );

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            width,
            height,
        })
    }
}

/// Pack RGB pixels as YUV 4:2:2 (Y0 U Y1 V), averaging chroma per pixel pair
fn rgb_to_yuyv(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut yuyv = Vec::with_capacity(width as usize * height as usize * 2);

    for row in rgb.chunks_exact(width as usize * 3) {
        for x in (0..width as usize).step_by(2) {
            let p1 = &row[x * 3..x * 3 + 3];
            let p2 = if x + 1 < width as usize {
                &row[(x + 1) * 3..(x + 1) * 3 + 3]
            } else {
                p1
            };

            let (y1, u1, v1) = rgb_to_yuv(p1[0], p1[1], p1[2]);
            let (y2, u2, v2) = rgb_to_yuv(p2[0], p2[1], p2[2]);

            let u = ((u1 as u16 + u2 as u16) / 2) as u8;
            let v = ((v1 as u16 + v2 as u16) / 2) as u8;

            yuyv.extend_from_slice(&[y1, u, y2, v]);
        }
    }

    yuyv
}

/// Convert RGB to YUV color space
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl OutputSink for V4L2Output {
    fn write_frame(&mut self, frame: &FramePixels) -> Result<()> {
        let mut rgb = frame.to_rgb_image()?;
        if rgb.dimensions() != (self.width, self.height) {
            rgb = imageops::resize(
                &rgb,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            );
        }

        let yuyv = rgb_to_yuyv(rgb.as_raw(), self.width, self.height);

        self.file
            .write_all(&yuyv)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn keeps_alpha(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_packs_two_pixels_per_four_bytes() {
        let rgb = [255, 255, 255, 0, 0, 0, 255, 255, 255];
        let yuyv = rgb_to_yuyv(&rgb, 3, 1);

        // Odd width duplicates the last pixel into its pair
        assert_eq!(yuyv.len(), 8);
        assert!(yuyv[0].abs_diff(255) <= 1);
        assert_eq!(yuyv[2], 0);
        assert!(yuyv[4].abs_diff(255) <= 1 && yuyv[6].abs_diff(255) <= 1);
    }

    #[test]
    fn test_yuyv_is_two_bytes_per_pixel() {
        let rgb = vec![64; 6 * 4 * 3];
        let yuyv = rgb_to_yuyv(&rgb, 6, 4);

        assert_eq!(yuyv.len(), 6 * 4 * 2);
    }

    #[test]
    fn test_gray_has_neutral_chroma() {
        let (y, u, v) = rgb_to_yuv(128, 128, 128);
        assert!(y.abs_diff(128) <= 1);
        assert!(u.abs_diff(128) <= 1 && v.abs_diff(128) <= 1);
    }
}
