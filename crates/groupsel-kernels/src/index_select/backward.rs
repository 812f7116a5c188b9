//! Backward pass for single-tensor index-select.
//!
//! ```ignore
//! grad_input = zeros(input_shape)
//! for j in 0..num_indices:
//!     grad_input[sorted[j]] += grad_output[orig[j]]
//! ```
//!
//! With a consecutive range hint the accumulation runs on a
//! `[range_length, ...]` buffer that is then placed into the full gradient.

use std::ops::Range;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use groupsel_core::error::{GroupSelectError, GroupSelectResult};

/// Indices as saved by the forward pass.
#[derive(Debug)]
pub(crate) enum SavedIndices<B: Backend> {
    /// Sorted indices and their original positions.
    Sorted {
        sorted: Tensor<B, 1, Int>,
        orig: Tensor<B, 1, Int>,
    },
    Unsorted(Tensor<B, 1, Int>),
}

/// Saved state of one `index_select_dim0` forward pass.
#[derive(Debug)]
#[must_use = "the saved state is required to run the backward pass"]
pub struct IndexSelectState<B: Backend, const D: usize> {
    input_dims: [usize; D],
    indices: SavedIndices<B>,
    range: Option<Range<usize>>,
}

impl<B: Backend, const D: usize> IndexSelectState<B, D> {
    pub(crate) fn new(
        input_dims: [usize; D],
        indices: SavedIndices<B>,
        range: Option<Range<usize>>,
    ) -> Self {
        Self {
            input_dims,
            indices,
            range,
        }
    }

    pub fn input_dims(&self) -> [usize; D] {
        self.input_dims
    }

    /// Scatter-accumulate `grad_output` onto a zero gradient of the input shape.
    pub fn backward(self, grad_output: Tensor<B, D>) -> GroupSelectResult<Tensor<B, D>> {
        let (sorted, orig) = match self.indices {
            SavedIndices::Sorted { sorted, orig } => (sorted, orig),
            SavedIndices::Unsorted(indices) => indices.sort_with_indices(0),
        };

        let mut expected = self.input_dims;
        expected[0] = sorted.dims()[0];
        if grad_output.dims() != expected {
            return Err(GroupSelectError::GradientShapeMismatch {
                item: 0,
                expected: expected.to_vec(),
                got: grad_output.dims().to_vec(),
            });
        }

        let device = grad_output.device();
        let grad_sorted = grad_output.select(0, orig);
        let grad_input = Tensor::<B, D>::zeros(self.input_dims, &device);

        let Some(range) = self.range else {
            return Ok(grad_input.select_assign(0, sorted, grad_sorted));
        };

        let mut local_dims = self.input_dims;
        local_dims[0] = range.len();
        let local = Tensor::<B, D>::zeros(local_dims, &device).select_assign(
            0,
            sorted - range.start as i64,
            grad_sorted,
        );

        let ranges: [Range<usize>; D] = std::array::from_fn(|d| {
            if d == 0 {
                range.clone()
            } else {
                0..self.input_dims[d]
            }
        });
        Ok(grad_input.slice_assign(ranges, local))
    }
}
