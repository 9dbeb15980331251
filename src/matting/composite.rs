use super::types::FramePixels;
use crate::config::Background;
use crate::error::{MattingError, Result};
use image::imageops;

/// Interleave foreground colour and alpha into one RGBA frame
///
/// Pixel `i` of the result is `fg[i].rgb` with `alpha[i]` as its fourth
/// channel; no premultiplication.
pub fn composite(foreground: &FramePixels, alpha: &FramePixels) -> Result<FramePixels> {
    let _span = tracing::debug_span!("composite").entered();

    if foreground.dimensions() != alpha.dimensions() {
        return Err(MattingError::DimensionMismatch {
            foreground: foreground.dimensions(),
            alpha: alpha.dimensions(),
        });
    }
    if foreground.channels != 3 || alpha.channels != 1 {
        return Err(MattingError::UnsupportedChannelLayout(format!(
            "compositing needs RGB foreground and single-channel alpha, got {} and {}",
            foreground.channels, alpha.channels
        )));
    }

    let mut rgba = Vec::with_capacity(foreground.pixel_count() * 4);
    for (rgb, a) in foreground.data.chunks_exact(3).zip(&alpha.data) {
        rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], *a]);
    }

    FramePixels::new(foreground.width, foreground.height, 4, rgba)
}

/// Blend an RGBA composite over a background, dropping alpha
///
/// `source` is the original frame, used when the background is a blur of it.
pub fn flatten(
    composite: &FramePixels,
    background: &Background,
    source: &FramePixels,
) -> Result<FramePixels> {
    let _span = tracing::debug_span!("flatten").entered();

    if composite.channels != 4 {
        return Err(MattingError::UnsupportedChannelLayout(format!(
            "flatten needs an RGBA composite, got {} channels",
            composite.channels
        )));
    }

    let backdrop = match background {
        Background::Color(rgb) => rgb.repeat(composite.pixel_count()),
        Background::Blur(sigma) => {
            if source.dimensions() != composite.dimensions() {
                return Err(MattingError::DimensionMismatch {
                    foreground: composite.dimensions(),
                    alpha: source.dimensions(),
                });
            }
            imageops::blur(&source.to_rgb_image()?, *sigma).into_raw()
        }
    };

    let rgb = composite
        .data
        .chunks_exact(4)
        .zip(backdrop.chunks_exact(3))
        .flat_map(|(fg, bg)| {
            let a = fg[3] as f32 / 255.0;
            let blend = move |i: usize| (fg[i] as f32 * a + bg[i] as f32 * (1.0 - a)).round() as u8;
            [blend(0), blend(1), blend(2)]
        })
        .collect();

    FramePixels::new(composite.width, composite.height, 3, rgb)
}

/// Convert an alpha matte to a grayscale RGB image for visualization
pub fn matte_to_rgb(alpha: &FramePixels) -> Result<FramePixels> {
    if alpha.channels != 1 {
        return Err(MattingError::UnsupportedChannelLayout(format!(
            "matte visualization needs one channel, got {}",
            alpha.channels
        )));
    }
    let rgb = alpha.data.iter().flat_map(|&v| [v, v, v]).collect();
    FramePixels::new(alpha.width, alpha.height, 3, rgb)
}
