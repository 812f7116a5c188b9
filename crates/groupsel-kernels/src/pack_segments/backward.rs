//! Backward pass for segment packing.
//!
//! The gradient of a pack is an unpack: every kept input row takes the
//! gradient of its packed slot; truncated rows and padding contribute nothing.

use burn::tensor::{Tensor, TensorPrimitive};
use groupsel_core::error::{GroupSelectError, GroupSelectResult};
use groupsel_core::segments::SegmentLayout;

use crate::GroupSelectBackend;

/// Saved state of one [`pack_segments`](super::pack_segments) call.
#[derive(Debug)]
#[must_use = "the saved state is required to run the backward pass"]
pub struct PackSegmentsState<B: GroupSelectBackend, const D: usize> {
    input_dims: [usize; D],
    packed_dims: Vec<usize>,
    segments: SegmentLayout,
    device: B::Device,
}

impl<B: GroupSelectBackend, const D: usize> PackSegmentsState<B, D> {
    pub(crate) fn new(
        input_dims: [usize; D],
        packed_dims: Vec<usize>,
        segments: SegmentLayout,
        device: B::Device,
    ) -> Self {
        Self {
            input_dims,
            packed_dims,
            segments,
            device,
        }
    }

    pub fn segments(&self) -> &SegmentLayout {
        &self.segments
    }

    /// Unpack `grad_packed` back to the input shape.
    ///
    /// # Errors
    /// `GradientShapeMismatch` if `grad_packed` differs from the packed output.
    pub fn backward<const P: usize>(self, grad_packed: Tensor<B, P>) -> GroupSelectResult<Tensor<B, D>> {
        if grad_packed.dims().as_slice() != self.packed_dims.as_slice() {
            return Err(GroupSelectError::GradientShapeMismatch {
                item: 0,
                expected: self.packed_dims,
                got: grad_packed.dims().to_vec(),
            });
        }
        if grad_packed.device() != self.device {
            return Err(GroupSelectError::DeviceMismatch {
                op: "pack_segments_backward",
                item: 0,
            });
        }

        let num_inputs = self.segments.total_rows() * self.segments.num_cols();
        let num_packed = self.segments.packed_elements();
        if num_inputs == 0 || num_packed == 0 {
            return Ok(Tensor::zeros(self.input_dims, &self.device));
        }

        let flat = grad_packed.reshape([num_packed]);
        let grad_input = Tensor::<B, 1>::from_primitive(TensorPrimitive::Float(B::unpack_segments(
            flat.into_primitive().tensor(),
            &self.segments,
        )));
        Ok(grad_input.reshape(self.input_dims))
    }
}
