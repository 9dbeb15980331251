use thiserror::Error;

/// Errors produced while turning a frame into a matting result.
///
/// Every variant leaves the pipeline untouched: the recurrent state and the
/// last good result stay exactly as they were before the failing frame.
#[derive(Error, Debug)]
pub enum MattingError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsupported channel layout: {0}")]
    UnsupportedChannelLayout(String),

    #[error("Backend did not produce recurrent output `{0}`")]
    MissingStateOutput(&'static str),

    #[error("Backend did not produce image output `{0}`")]
    MissingImageOutput(&'static str),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("Foreground is {foreground:?} but alpha is {alpha:?}")]
    DimensionMismatch {
        foreground: (u32, u32),
        alpha: (u32, u32),
    },

    #[error("Invalid tensor: {0}")]
    InvalidTensor(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ndarray::ShapeError> for MattingError {
    fn from(err: ndarray::ShapeError) -> Self {
        MattingError::InvalidTensor(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MattingError>;
