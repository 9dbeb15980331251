use super::tensor::NamedTensor;
use ndarray::ArrayViewD;

#[cfg(feature = "ort-backend")]
pub mod ort;

pub mod stub;

/// Outputs of a single inference call, valid only inside [`InferenceBackend::run`]
///
/// The views borrow backend-owned storage. Anything that must outlive the call
/// has to be copied out before the consumer returns.
pub struct OutputScope<'a> {
    tensors: Vec<NamedTensor<'a>>,
}

impl<'a> OutputScope<'a> {
    pub fn new(tensors: Vec<NamedTensor<'a>>) -> Self {
        Self { tensors }
    }

    pub fn get(&self, name: &str) -> Option<&ArrayViewD<'a, f32>> {
        self.tensors
            .iter()
            .find(|tensor| tensor.name == name)
            .map(|tensor| &tensor.view)
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.tensors.iter().map(|tensor| tensor.name)
    }
}

/// Executes the matting graph on named tensors
///
/// Allows swapping between a real engine and a deterministic stub.
pub trait InferenceBackend {
    /// Run the model once
    ///
    /// `consume` is invoked at most once with the outputs. The outputs are
    /// released when `consume` returns, so it must copy whatever it keeps.
    /// Returning `Ok` without having called `consume` is treated as a failed
    /// call by the pipeline.
    fn run(
        &mut self,
        inputs: &[NamedTensor<'_>],
        consume: &mut dyn FnMut(&OutputScope<'_>),
    ) -> anyhow::Result<()>;
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn run(
        &mut self,
        inputs: &[NamedTensor<'_>],
        consume: &mut dyn FnMut(&OutputScope<'_>),
    ) -> anyhow::Result<()> {
        (**self).run(inputs, consume)
    }
}

/// Look up a required input by name
pub(crate) fn find_input<'a>(
    inputs: &[NamedTensor<'a>],
    name: &str,
) -> anyhow::Result<ArrayViewD<'a, f32>> {
    inputs
        .iter()
        .find(|tensor| tensor.name == name)
        .map(|tensor| tensor.view.clone())
        .ok_or_else(|| anyhow::anyhow!("missing input tensor `{name}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_find_input_outlives_the_input_slice() {
        let src = ArrayD::from_elem(IxDyn(&[1, 3, 2, 2]), 0.5f32);
        let ratio = ArrayD::from_elem(IxDyn(&[1]), 0.25f32);

        let view = {
            let inputs = vec![
                NamedTensor::new("src", src.view()),
                NamedTensor::new("downsample_ratio", ratio.view()),
            ];
            find_input(&inputs, "downsample_ratio").unwrap()
        };

        assert_eq!(view.shape(), &[1]);
        assert_eq!(view.iter().next(), Some(&0.25));
    }

    #[test]
    fn test_find_input_reports_missing_name() {
        let src = ArrayD::from_elem(IxDyn(&[1, 3, 2, 2]), 0.0f32);
        let inputs = [NamedTensor::new("src", src.view())];

        let err = find_input(&inputs, "r1i").unwrap_err();
        assert!(err.to_string().contains("r1i"), "{err}");
    }

    #[test]
    fn test_scope_lists_names_in_order() {
        let a = ArrayD::from_elem(IxDyn(&[1, 1, 1, 1]), 1.0f32);
        let b = ArrayD::from_elem(IxDyn(&[1, 3, 1, 1]), 2.0f32);
        let scope = OutputScope::new(vec![
            NamedTensor::new("pha", a.view()),
            NamedTensor::new("fgr", b.view()),
        ]);

        let names: Vec<&str> = scope.names().collect();

        assert_eq!(names, ["pha", "fgr"]);
        assert_eq!(
            scope.get("fgr").map(|v| v.shape().to_vec()),
            Some(vec![1, 3, 1, 1])
        );
        assert!(scope.get("r1o").is_none());
    }
}
