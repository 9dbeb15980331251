use super::{find_input, InferenceBackend, OutputScope};
use crate::matting::tensor::{names, NamedTensor, TensorBuffer};
use ndarray::{ArrayD, IxDyn};

/// Channel counts of the four recurrent layers in the MobileNetV3 variant
const RECURRENT_CHANNELS: [usize; 4] = [16, 20, 40, 64];

/// Deterministic identity model
///
/// Echoes `src` as the foreground, emits a constant alpha matte and fills
/// each recurrent output with `call + layer / 10`. Recurrent shapes follow the
/// input size scaled by the downsample ratio, halving per layer.
///
/// Output storage is retained by the backend and zeroed as soon as the
/// consumer returns, the same way a real session releases its buffers.
#[derive(Debug, Default)]
pub struct StubBackend {
    alpha: f32,
    fail_on_call: Option<u64>,
    omitted: Vec<&'static str>,
    record_inputs: bool,
    calls: u64,
    recorded: Vec<RecordedCall>,
    retained: Vec<(&'static str, ArrayD<f32>)>,
}

/// Owned copy of the inputs one call received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: u64,
    pub inputs: Vec<(String, TensorBuffer)>,
}

impl RecordedCall {
    pub fn input(&self, name: &str) -> Option<&TensorBuffer> {
        self.inputs
            .iter()
            .find(|(input, _)| input == name)
            .map(|(_, tensor)| tensor)
    }
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            alpha: 1.0,
            ..Default::default()
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Keep a copy of every call's inputs for later inspection
    pub fn recording(mut self) -> Self {
        self.record_inputs = true;
        self
    }

    /// Fail the given call (1-based); `None` disables failures
    pub fn set_fail_on_call(&mut self, call: Option<u64>) {
        self.fail_on_call = call;
    }

    /// Leave the named outputs out of every following call
    pub fn set_omitted(&mut self, outputs: &[&'static str]) {
        self.omitted = outputs.to_vec();
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn recorded(&self) -> &[RecordedCall] {
        &self.recorded
    }

    pub fn last_call(&self) -> Option<&RecordedCall> {
        self.recorded.last()
    }

    /// True once every retained output buffer has been zeroed
    pub fn outputs_released(&self) -> bool {
        self.retained
            .iter()
            .all(|(_, array)| array.iter().all(|&v| v == 0.0))
    }

    fn produce_outputs(&mut self, src: &ArrayD<f32>, ratio: f32) -> anyhow::Result<()> {
        let shape = src.shape();
        if shape.len() != 4 {
            anyhow::bail!("stub expects a rank 4 `src`, got {shape:?}");
        }
        let (height, width) = (shape[2], shape[3]);
        let scaled = |n: usize| ((n as f32 * ratio).round() as usize).max(1);
        let (state_h, state_w) = (scaled(height), scaled(width));

        self.retained.clear();
        self.retained.push((names::FGR, src.clone()));
        self.retained.push((
            names::PHA,
            ArrayD::from_elem(IxDyn(&[1, 1, height, width]), self.alpha),
        ));

        for (layer, name) in names::RECURRENT_OUTPUTS.iter().enumerate() {
            let dims = [
                1,
                RECURRENT_CHANNELS[layer],
                (state_h >> layer).max(1),
                (state_w >> layer).max(1),
            ];
            let value = self.calls as f32 + layer as f32 / 10.0;
            self.retained.push((*name, ArrayD::from_elem(IxDyn(&dims), value)));
        }

        self.retained.retain(|(name, _)| !self.omitted.contains(name));
        Ok(())
    }
}

impl InferenceBackend for StubBackend {
    fn run(
        &mut self,
        inputs: &[NamedTensor<'_>],
        consume: &mut dyn FnMut(&OutputScope<'_>),
    ) -> anyhow::Result<()> {
        self.calls += 1;
        let call = self.calls;

        if self.record_inputs {
            self.recorded.push(RecordedCall {
                call,
                inputs: inputs
                    .iter()
                    .map(|t| (t.name.to_string(), TensorBuffer::copy_from_view(&t.view)))
                    .collect(),
            });
        }

        if self.fail_on_call == Some(call) {
            anyhow::bail!("stub failure on call {call}");
        }

        let src = find_input(inputs, names::SRC)?.to_owned();
        let ratio = find_input(inputs, names::DOWNSAMPLE_RATIO)?
            .iter()
            .next()
            .copied()
            .unwrap_or(1.0);

        self.produce_outputs(&src, ratio)?;

        {
            let scope = OutputScope::new(
                self.retained
                    .iter()
                    .map(|(name, array)| NamedTensor::new(name, array.view()))
                    .collect(),
            );
            consume(&scope);
        }

        for (_, array) in &mut self.retained {
            array.fill(0.0);
        }

        Ok(())
    }
}
