mod directory;
mod v4l_capture;

pub use directory::ImageDirectory;
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use matte_stream::FramePixels;

/// Trait for frame sources
pub trait CaptureSource {
    /// Capture the next frame; `None` once the source is exhausted
    fn capture_frame(&mut self) -> Result<Option<FramePixels>>;

    /// Get the resolution of captured frames, if known up front
    fn resolution(&self) -> Option<(u32, u32)>;
}
