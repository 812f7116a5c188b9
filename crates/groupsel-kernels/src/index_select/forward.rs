//! Forward pass for single-tensor index-select.

use std::ops::Range;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use groupsel_core::config::GroupSelectConfig;
use groupsel_core::error::{GroupSelectError, GroupSelectResult};

use super::backward::{IndexSelectState, SavedIndices};
use crate::arena::check_indices;

const OP: &str = "index_select_dim0";

/// Gather rows of `input` along dimension 0.
///
/// # Arguments
/// * `input` - Source tensor `[num_rows, ...]`
/// * `indices` - Row ids `[num_indices]`
/// * `range_start`, `range_length` - When `range_length > 0`, every index is
///   promised to lie in `[range_start, range_start + range_length)` and the
///   backward pass only accumulates over that range
/// * `skip_sort` - Gather in the given order instead of sorting first
/// * `config` - Only `validate_indices` is read
///
/// # Returns
/// `[num_indices, ...]` output and the state for the backward pass
pub fn index_select_dim0<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    indices: Tensor<B, 1, Int>,
    range_start: usize,
    range_length: usize,
    skip_sort: bool,
    config: &GroupSelectConfig,
) -> GroupSelectResult<(Tensor<B, D>, IndexSelectState<B, D>)> {
    if D == 0 {
        return Err(GroupSelectError::ScalarInput { op: OP });
    }
    if input.device() != indices.device() {
        return Err(GroupSelectError::DeviceMismatch { op: OP, item: 0 });
    }

    let input_dims = input.dims();
    let num_rows = input_dims[0];

    let range = (range_length > 0).then(|| range_start..range_start + range_length);
    if let Some(range) = &range {
        if range.end > num_rows {
            return Err(GroupSelectError::IndexOutOfRange {
                op: OP,
                item: 0,
                index: range.end as i64 - 1,
                low: 0,
                high: num_rows as i64,
            });
        }
    }

    if config.validate_indices() {
        let Range { start, end } = range.clone().unwrap_or(0..num_rows);
        check_indices(OP, 0, &indices, start as i64, end as i64)?;
    }

    log::debug!(
        "{OP}: rows={} indices={} sorted={} range={:?}",
        num_rows,
        indices.dims()[0],
        !skip_sort,
        range
    );

    let (output, saved) = if skip_sort {
        let output = input.select(0, indices.clone());
        (output, SavedIndices::Unsorted(indices))
    } else {
        // Gather in sorted order, then scatter rows back to their positions
        let (sorted, orig) = indices.sort_with_indices(0);
        let gathered = input.select(0, sorted.clone());
        let mut out_dims = input_dims;
        out_dims[0] = sorted.dims()[0];
        let output = Tensor::zeros(out_dims, &gathered.device())
            .select_assign(0, orig.clone(), gathered);
        (output, SavedIndices::Sorted { sorted, orig })
    };

    Ok((output, IndexSelectState::new(input_dims, saved, range)))
}

/// Forward-only row gather along dimension 0 using the global configuration.
pub fn index_select<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    indices: Tensor<B, 1, Int>,
) -> GroupSelectResult<Tensor<B, D>> {
    let (output, _state) = index_select_dim0(input, indices, 0, 0, true, GroupSelectConfig::global())?;
    Ok(output)
}
