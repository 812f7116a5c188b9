//! Forward pass for segment packing.

use burn::tensor::{Int, Tensor, TensorPrimitive};
use groupsel_core::error::{GroupSelectError, GroupSelectResult};
use groupsel_core::segments::SegmentLayout;

use super::backward::PackSegmentsState;
use crate::GroupSelectBackend;

const OP: &str = "pack_segments";

/// Pack consecutive variable-length segments of rows into a padded batch.
///
/// # Arguments
/// * `input` - `[total_rows, ...]`
/// * `lengths` - Rows per segment, summing to `total_rows`
/// * `max_length` - Padded segment length; segments longer than this are
///   truncated. `None` pads to the longest segment
///
/// # Returns
/// `[num_segments, max_length, ...]` output (rank `D + 1`) and the state for
/// the backward pass
pub fn pack_segments<B: GroupSelectBackend, const D: usize, const P: usize>(
    input: Tensor<B, D>,
    lengths: Tensor<B, 1, Int>,
    max_length: Option<usize>,
) -> GroupSelectResult<(Tensor<B, P>, PackSegmentsState<B, D>)> {
    if D == 0 {
        return Err(GroupSelectError::ScalarInput { op: OP });
    }
    if P != D + 1 {
        return Err(GroupSelectError::RankMismatch {
            op: OP,
            item: 0,
            expected: D + 1,
            got: P,
        });
    }
    let device = input.device();
    if lengths.device() != device {
        return Err(GroupSelectError::DeviceMismatch { op: OP, item: 0 });
    }

    let input_dims = input.dims();
    let num_cols = input_dims[1..].iter().product();
    let lengths: Vec<i64> = lengths.into_data().iter::<i64>().collect();
    let segments = SegmentLayout::new(&lengths, input_dims[0], num_cols, max_length)?;

    let mut packed_dims = [0usize; P];
    packed_dims[0] = segments.num_segments();
    packed_dims[1] = segments.max_length();
    packed_dims[2..].copy_from_slice(&input_dims[1..]);

    log::debug!(
        "{OP}: rows={} segments={} max_length={} cols={}",
        segments.total_rows(),
        segments.num_segments(),
        segments.max_length(),
        num_cols
    );

    let num_inputs = segments.total_rows() * num_cols;
    let packed = if num_inputs == 0 || segments.packed_elements() == 0 {
        Tensor::zeros(packed_dims, &device)
    } else {
        let flat = input.reshape([num_inputs]);
        Tensor::<B, 1>::from_primitive(TensorPrimitive::Float(B::pack_segments(
            flat.into_primitive().tensor(),
            &segments,
        )))
        .reshape(packed_dims)
    };

    Ok((
        packed,
        PackSegmentsState::new(input_dims, packed_dims.to_vec(), segments, device),
    ))
}
