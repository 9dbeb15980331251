pub mod backend;
mod codec;
mod composite;
mod pipeline;
pub mod ratio;
mod state;
pub mod tensor;
pub mod types;

pub use backend::stub::StubBackend;
#[cfg(feature = "ort-backend")]
pub use backend::ort::OrtBackend;
pub use backend::{InferenceBackend, OutputScope};
pub use codec::ImageCodec;
pub use composite::{composite, flatten, matte_to_rgb};
pub use pipeline::MattingPipeline;
pub use ratio::{suggested_downsample_ratio, AdaptiveRatio, DownsampleRatio};
pub use state::{RecurrentState, RecurrentStateStore, PLACEHOLDER_SHAPE};
pub use tensor::{NamedTensor, TensorBuffer};
pub use types::{ChannelMode, FramePixels, MattingResult};
