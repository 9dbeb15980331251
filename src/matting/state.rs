use super::backend::OutputScope;
use super::tensor::{names, TensorBuffer};
use crate::error::{MattingError, Result};

/// Shape fed to the backend when there is no prior state
pub const PLACEHOLDER_SHAPE: [usize; 4] = [1, 1, 1, 1];

/// Hidden state of the four recurrent layers
///
/// Shapes are whatever the backend last returned; they change with the
/// downsample ratio and are never assumed fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentState {
    layers: [TensorBuffer; 4],
}

impl RecurrentState {
    /// Placeholder zeros, which the model treats as "start of sequence"
    pub fn initial() -> Self {
        Self {
            layers: std::array::from_fn(|_| TensorBuffer::zeros(&PLACEHOLDER_SHAPE)),
        }
    }

    /// Copy `r1o..r4o` out of a backend result into owned buffers
    pub fn copy_from_outputs(outputs: &OutputScope<'_>) -> Result<Self> {
        let mut layers = Vec::with_capacity(4);
        for name in names::RECURRENT_OUTPUTS {
            let view = outputs
                .get(name)
                .ok_or(MattingError::MissingStateOutput(name))?;
            layers.push(TensorBuffer::copy_from_view(view));
        }
        let layers: [TensorBuffer; 4] = layers
            .try_into()
            .map_err(|_| MattingError::InvalidTensor("expected four recurrent layers".into()))?;
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[TensorBuffer; 4] {
        &self.layers
    }

    pub fn is_placeholder(&self) -> bool {
        self.layers
            .iter()
            .all(|t| t.shape() == PLACEHOLDER_SHAPE && t.data() == [0.0])
    }
}

/// Owns the recurrent state of one pipeline
///
/// Updates build a complete new state before replacing the old one, so a
/// failed update leaves the current state untouched.
#[derive(Debug)]
pub struct RecurrentStateStore {
    current: RecurrentState,
}

impl RecurrentStateStore {
    pub fn new() -> Self {
        Self {
            current: RecurrentState::initial(),
        }
    }

    pub fn current(&self) -> &RecurrentState {
        &self.current
    }

    /// Replace the state with copies of this call's recurrent outputs
    ///
    /// Standalone form of [`RecurrentState::copy_from_outputs`] followed by
    /// [`replace`](Self::replace). The pipeline does those two steps apart,
    /// copying inside the backend's consumer and committing only once the
    /// whole frame has succeeded.
    pub fn update(&mut self, outputs: &OutputScope<'_>) -> Result<()> {
        let state = RecurrentState::copy_from_outputs(outputs)?;
        self.replace(state);
        Ok(())
    }

    /// Install a state that was already copied out of a backend result
    pub fn replace(&mut self, state: RecurrentState) {
        self.current = state;
    }

    /// Forget temporal memory; takes effect on the next inference call
    pub fn reset(&mut self) {
        tracing::debug!("Resetting recurrent state to placeholder");
        self.current = RecurrentState::initial();
    }
}

impl Default for RecurrentStateStore {
    fn default() -> Self {
        Self::new()
    }
}
