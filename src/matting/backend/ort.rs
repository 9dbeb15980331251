use super::{find_input, InferenceBackend, OutputScope};
use crate::matting::tensor::{names, NamedTensor};
use anyhow::Context;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::path::Path;

/// RobustVideoMatting exported to ONNX, run through ONNX Runtime
///
/// The graph takes `src`, `downsample_ratio` and `r1i..r4i` and produces
/// `fgr`, `pha` and `r1o..r4o`.
pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    pub fn load<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> anyhow::Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("RVM model loaded successfully");

        Ok(Self { session })
    }
}

impl InferenceBackend for OrtBackend {
    fn run(
        &mut self,
        inputs: &[NamedTensor<'_>],
        consume: &mut dyn FnMut(&OutputScope<'_>),
    ) -> anyhow::Result<()> {
        let _span = tracing::debug_span!("inference").entered();

        let [r1, r2, r3, r4] = names::RECURRENT_INPUTS;
        let outputs = self
            .session
            .run(ort::inputs![
                names::SRC => TensorRef::from_array_view(find_input(inputs, names::SRC)?)?,
                names::DOWNSAMPLE_RATIO => TensorRef::from_array_view(find_input(inputs, names::DOWNSAMPLE_RATIO)?)?,
                r1 => TensorRef::from_array_view(find_input(inputs, r1)?)?,
                r2 => TensorRef::from_array_view(find_input(inputs, r2)?)?,
                r3 => TensorRef::from_array_view(find_input(inputs, r3)?)?,
                r4 => TensorRef::from_array_view(find_input(inputs, r4)?)?
            ])
            .context("Failed to run inference")?;

        // Absent outputs are left out of the scope; the pipeline decides what is required
        let mut views = Vec::with_capacity(6);
        for name in [names::FGR, names::PHA]
            .into_iter()
            .chain(names::RECURRENT_OUTPUTS)
        {
            if let Some(value) = outputs.get(name) {
                let view = value
                    .try_extract_array::<f32>()
                    .with_context(|| format!("Output `{name}` is not an f32 tensor"))?;
                views.push(NamedTensor::new(name, view));
            }
        }

        consume(&OutputScope::new(views));

        Ok(())
    }
}
