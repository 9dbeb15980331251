//! Recurrent video matting: frames in, foreground + alpha + RGBA composite out.
//!
//! [`MattingPipeline`] threads RobustVideoMatting hidden state from frame to
//! frame through any [`InferenceBackend`].

pub mod config;
pub mod error;
pub mod matting;

pub use config::{AdaptiveConfig, Background, PipelineConfig};
pub use error::{MattingError, Result};
pub use matting::{
    FramePixels, ImageCodec, InferenceBackend, MattingPipeline, MattingResult, StubBackend,
    TensorBuffer,
};
#[cfg(feature = "ort-backend")]
pub use matting::OrtBackend;
