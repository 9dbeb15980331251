use crate::error::{MattingError, Result};
use ndarray::{ArrayD, ArrayViewD, IxDyn};

/// Tensor names exchanged with the inference backend
pub mod names {
    pub const SRC: &str = "src";
    pub const DOWNSAMPLE_RATIO: &str = "downsample_ratio";
    pub const RECURRENT_INPUTS: [&str; 4] = ["r1i", "r2i", "r3i", "r4i"];

    pub const FGR: &str = "fgr";
    pub const PHA: &str = "pha";
    pub const RECURRENT_OUTPUTS: [&str; 4] = ["r1o", "r2o", "r3o", "r4o"];
}

/// Owned, contiguous f32 tensor with an immutable shape
///
/// The data length always equals the product of the shape, and the memory is
/// kept in standard (row-major) order so it can be handed to a backend as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBuffer {
    array: ArrayD<f32>,
}

impl TensorBuffer {
    pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(MattingError::InvalidTensor(format!(
                "shape must be non-empty with positive dimensions, got {shape:?}"
            )));
        }
        let array = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Ok(Self { array })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            array: ArrayD::zeros(IxDyn(shape)),
        }
    }

    /// A single value with shape `[1]`
    pub fn scalar(value: f32) -> Self {
        Self {
            array: ArrayD::from_elem(IxDyn(&[1]), value),
        }
    }

    /// Deep copy of a borrowed view; the result never aliases the source
    pub fn copy_from_view(view: &ArrayViewD<'_, f32>) -> Self {
        Self {
            array: view.as_standard_layout().into_owned(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    pub fn data(&self) -> &[f32] {
        self.array.as_slice().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.array.view()
    }
}

impl From<ndarray::Array4<f32>> for TensorBuffer {
    fn from(array: ndarray::Array4<f32>) -> Self {
        Self {
            array: array.as_standard_layout().into_owned().into_dyn(),
        }
    }
}

/// A tensor view paired with the name the backend knows it by
///
/// Used for both directions: inputs borrow from the pipeline, outputs borrow
/// from the backend for the duration of a single call.
#[derive(Debug, Clone)]
pub struct NamedTensor<'a> {
    pub name: &'a str,
    pub view: ArrayViewD<'a, f32>,
}

impl<'a> NamedTensor<'a> {
    pub fn new(name: &'a str, view: ArrayViewD<'a, f32>) -> Self {
        Self { name, view }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_length_matches_shape_product() {
        let tensor = TensorBuffer::new(&[1, 2, 3, 4], vec![0.5; 24]).unwrap();
        assert_eq!(tensor.len(), tensor.shape().iter().product::<usize>());
        assert_eq!(tensor.data().len(), 24);
    }

    #[test]
    fn test_rejects_data_shape_mismatch() {
        let result = TensorBuffer::new(&[1, 3, 2, 2], vec![0.0; 10]);
        assert!(
            matches!(result, Err(MattingError::InvalidTensor(_))),
            "10 values cannot fill a [1, 3, 2, 2] tensor"
        );
    }

    #[test]
    fn test_rejects_zero_dimension() {
        assert!(TensorBuffer::new(&[1, 0, 2], vec![]).is_err());
        assert!(TensorBuffer::new(&[], vec![1.0]).is_err());
    }

    #[test]
    fn test_scalar_has_shape_one() {
        let tensor = TensorBuffer::scalar(0.25);
        assert_eq!(tensor.shape(), &[1]);
        assert_eq!(tensor.data(), &[0.25]);
    }

    #[test]
    fn test_copy_from_view_does_not_alias() {
        let mut source = ArrayD::from_elem(IxDyn(&[1, 2, 2, 2]), 3.0f32);
        let copy = TensorBuffer::copy_from_view(&source.view());

        source.fill(0.0);

        assert!(
            copy.data().iter().all(|&v| v == 3.0),
            "Copy must keep its values after the source is cleared"
        );
    }

    #[test]
    fn test_copy_from_transposed_view_is_standard_layout() {
        let source = Array4::from_shape_fn((1, 2, 3, 1), |(_, c, h, _)| (c * 10 + h) as f32);
        let transposed = source.view().reversed_axes().into_dyn();
        let copy = TensorBuffer::copy_from_view(&transposed);

        assert_eq!(copy.shape(), &[1, 3, 2, 1]);
        assert_eq!(copy.data(), &[0.0, 10.0, 1.0, 11.0, 2.0, 12.0]);
    }
}
