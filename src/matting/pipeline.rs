use super::backend::{InferenceBackend, OutputScope};
use super::codec::ImageCodec;
use super::composite::composite;
use super::ratio::DownsampleRatio;
use super::state::{RecurrentState, RecurrentStateStore};
use super::tensor::{names, NamedTensor, TensorBuffer};
use super::types::{ChannelMode, FramePixels, MattingResult};
use crate::config::PipelineConfig;
use crate::error::{MattingError, Result};

/// Everything copied out of one backend result
struct CopiedOutputs {
    foreground: FramePixels,
    alpha: FramePixels,
    state: RecurrentState,
}

impl CopiedOutputs {
    fn copy_from(outputs: &OutputScope<'_>, width: u32, height: u32) -> Result<Self> {
        let fgr = outputs
            .get(names::FGR)
            .ok_or(MattingError::MissingImageOutput(names::FGR))?;
        let pha = outputs
            .get(names::PHA)
            .ok_or(MattingError::MissingImageOutput(names::PHA))?;

        Ok(Self {
            foreground: ImageCodec::decode(fgr, width, height, ChannelMode::Rgb)?,
            alpha: ImageCodec::decode(pha, width, height, ChannelMode::Alpha)?,
            state: RecurrentState::copy_from_outputs(outputs)?,
        })
    }
}

/// Per-frame RobustVideoMatting driver
///
/// Owns the recurrent state of exactly one image sequence. Frames must be
/// fed in order; call [`reset`](Self::reset) before starting an unrelated
/// sequence, since stale state degrades the matte without raising an error.
///
/// A frame either fully succeeds or changes nothing: on any error the
/// recurrent state and the last result are what they were before the call.
pub struct MattingPipeline<B> {
    backend: B,
    codec: ImageCodec,
    state: RecurrentStateStore,
    ratio: DownsampleRatio,
    ratio_tensor: TensorBuffer,
    last: Option<MattingResult>,
    frames_processed: u64,
}

impl<B: InferenceBackend> MattingPipeline<B> {
    pub fn new(backend: B, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let ratio = DownsampleRatio::new(config.downsample_ratio);
        tracing::info!(
            "Matting pipeline ready: model input {}x{}, downsample ratio {:.2}",
            config.input_width,
            config.input_height,
            ratio.value()
        );

        Ok(Self {
            backend,
            codec: ImageCodec::new(config.input_width, config.input_height),
            state: RecurrentStateStore::new(),
            ratio,
            ratio_tensor: ratio.to_tensor(),
            last: None,
            frames_processed: 0,
        })
    }

    /// Set the ratio used from the next frame on; returns the clamped value
    ///
    /// Recurrent state is kept. The backend will report differently shaped
    /// state tensors afterwards, which the store accepts as-is.
    pub fn set_downsample_ratio(&mut self, ratio: f32) -> f32 {
        let ratio = DownsampleRatio::new(ratio);
        if ratio != self.ratio {
            tracing::info!(
                "Downsample ratio {:.2} -> {:.2}",
                self.ratio.value(),
                ratio.value()
            );
        }
        self.ratio = ratio;
        self.ratio_tensor = ratio.to_tensor();
        ratio.value()
    }

    pub fn downsample_ratio(&self) -> f32 {
        self.ratio.value()
    }

    /// Forget temporal memory; the next frame starts a new sequence
    pub fn reset(&mut self) {
        tracing::info!("Resetting RVM hidden states");
        self.state.reset();
    }

    /// Matte one frame
    ///
    /// Output resolution always matches `image`, whatever the model input size.
    pub fn process_frame(&mut self, image: &FramePixels) -> Result<&MattingResult> {
        let frame = self.frames_processed + 1;
        let _span = tracing::debug_span!("process_frame", frame).entered();

        let encoded = self.codec.encode(image)?;

        let [r1, r2, r3, r4] = self.state.current().layers();
        let [r1i, r2i, r3i, r4i] = names::RECURRENT_INPUTS;
        let inputs = [
            NamedTensor::new(names::SRC, encoded.view()),
            NamedTensor::new(names::DOWNSAMPLE_RATIO, self.ratio_tensor.view()),
            NamedTensor::new(r1i, r1.view()),
            NamedTensor::new(r2i, r2.view()),
            NamedTensor::new(r3i, r3.view()),
            NamedTensor::new(r4i, r4.view()),
        ];

        let (width, height) = image.dimensions();
        let mut copied = None;
        self.backend
            .run(&inputs, &mut |outputs| {
                copied = Some(CopiedOutputs::copy_from(outputs, width, height));
            })
            .map_err(MattingError::Inference)?;

        let copied = copied.ok_or_else(|| {
            MattingError::Inference(anyhow::anyhow!("backend returned without any outputs"))
        })??;

        let composite = composite(&copied.foreground, &copied.alpha)?;

        // Nothing below can fail, so state and result advance together
        self.state.replace(copied.state);
        self.frames_processed = frame;
        tracing::debug!("Frame {} matted at {}x{}", frame, width, height);

        Ok(self.last.insert(MattingResult {
            foreground: copied.foreground,
            alpha: copied.alpha,
            composite,
        }))
    }

    /// Result of the most recent successful frame
    pub fn last_result(&self) -> Option<&MattingResult> {
        self.last.as_ref()
    }

    pub fn last_foreground(&self) -> Option<&FramePixels> {
        self.last.as_ref().map(|r| &r.foreground)
    }

    pub fn last_alpha(&self) -> Option<&FramePixels> {
        self.last.as_ref().map(|r| &r.alpha)
    }

    pub fn last_composite(&self) -> Option<&FramePixels> {
        self.last.as_ref().map(|r| &r.composite)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn state(&self) -> &RecurrentState {
        self.state.current()
    }

    pub fn model_input_size(&self) -> (u32, u32) {
        self.codec.target_size()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matting::backend::stub::StubBackend;

    fn pipeline(backend: StubBackend) -> MattingPipeline<StubBackend> {
        let config = PipelineConfig {
            input_width: 8,
            input_height: 8,
            downsample_ratio: 0.5,
        };
        MattingPipeline::new(backend, &config).unwrap()
    }

    fn frame(width: u32, height: u32, value: u8) -> FramePixels {
        FramePixels::new(width, height, 3, vec![value; (width * height * 3) as usize]).unwrap()
    }

    #[test]
    fn test_set_downsample_ratio_clamps() {
        let mut pipeline = pipeline(StubBackend::new());

        assert_eq!(pipeline.set_downsample_ratio(-1.0), 0.1);
        assert_eq!(pipeline.downsample_ratio(), 0.1);
        assert_eq!(pipeline.set_downsample_ratio(5.0), 1.0);
        assert_eq!(pipeline.downsample_ratio(), 1.0);
    }

    #[test]
    fn test_output_matches_input_resolution() {
        let mut pipeline = pipeline(StubBackend::new().with_alpha(0.5));

        let result = pipeline.process_frame(&frame(20, 12, 200)).unwrap();

        assert_eq!(result.foreground.dimensions(), (20, 12));
        assert_eq!(result.alpha.dimensions(), (20, 12));
        assert_eq!(result.composite.dimensions(), (20, 12));
        assert_eq!(result.composite.channels, 4);
        assert!(result.alpha.data.iter().all(|&a| a == 128));
    }

    #[test]
    fn test_missing_image_output_is_reported() {
        let mut backend = StubBackend::new();
        backend.set_omitted(&["pha"]);
        let mut pipeline = pipeline(backend);

        let result = pipeline.process_frame(&frame(4, 4, 0));

        assert!(matches!(result, Err(MattingError::MissingImageOutput("pha"))));
        assert!(pipeline.last_result().is_none());
        assert!(pipeline.state().is_placeholder());
    }

    #[test]
    fn test_invalid_image_does_not_reach_backend() {
        let mut pipeline = pipeline(StubBackend::new());
        let broken = FramePixels {
            width: 3,
            height: 3,
            channels: 3,
            data: vec![0; 4],
        };

        assert!(matches!(
            pipeline.process_frame(&broken),
            Err(MattingError::InvalidImage(_))
        ));
        assert_eq!(pipeline.backend().calls(), 0);
    }

    #[test]
    fn test_boxed_backend_is_accepted() {
        let backend: Box<dyn InferenceBackend> = Box::new(StubBackend::new());
        let mut pipeline = MattingPipeline::new(backend, &PipelineConfig::default()).unwrap();

        assert!(pipeline.process_frame(&frame(2, 2, 10)).is_ok());
        assert_eq!(pipeline.frames_processed(), 1);
    }
}
