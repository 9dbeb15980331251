mod directory;
mod loopback;

pub use directory::PngSequence;
pub use loopback::V4L2Output;

use anyhow::Result;
use matte_stream::FramePixels;

/// Trait for output destinations
pub trait OutputSink {
    /// Write a frame to the output (RGB, or RGBA where the sink keeps alpha)
    fn write_frame(&mut self, frame: &FramePixels) -> Result<()>;

    /// Whether transparency survives this sink; if not, callers flatten first
    fn keeps_alpha(&self) -> bool;
}
