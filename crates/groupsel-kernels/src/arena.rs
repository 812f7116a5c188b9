//! Flat per-call arenas for group items.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use groupsel_core::error::{GroupSelectError, GroupSelectResult};
use groupsel_core::shape::{ArenaLayout, ItemShape};

/// Concatenate item tensors back to back into one flat tensor.
///
/// `items` must not be empty; items without elements take no space. When at
/// most one item holds elements its buffer is reshaped in place and nothing is
/// copied. Otherwise every item is copied once into a fresh arena.
pub(crate) fn flatten_into_arena<B: Backend, const D: usize>(
    items: Vec<Tensor<B, D>>,
) -> Tensor<B, 1> {
    let device = items[0].device();
    let mut flat: Vec<Tensor<B, 1>> = items
        .into_iter()
        .filter_map(|t| {
            let n = t.shape().num_elements();
            (n > 0).then(|| t.reshape([n]))
        })
        .collect();

    match flat.len() {
        0 => Tensor::zeros([0], &device),
        1 => flat.swap_remove(0),
        _ => Tensor::cat(flat, 0),
    }
}

/// Per-item views of a flat arena, reshaped to `shapes`.
pub(crate) fn split_arena<B: Backend, const D: usize>(
    arena: Tensor<B, 1>,
    layout: &ArenaLayout,
    shapes: &[ItemShape],
) -> Vec<Tensor<B, D>> {
    let device = arena.device();
    shapes
        .iter()
        .enumerate()
        .map(|(i, shape)| {
            let range = layout.range(i);
            let dims = dims_array::<D>(shape.dims());
            if range.is_empty() {
                Tensor::zeros(dims, &device)
            } else {
                arena.clone().slice([range]).reshape(dims)
            }
        })
        .collect()
}

pub(crate) fn dims_array<const D: usize>(dims: &[usize]) -> [usize; D] {
    let mut out = [0usize; D];
    out.copy_from_slice(dims);
    out
}

/// Host read-back of one index list, rejecting anything outside `[low, high)`.
pub(crate) fn check_indices<B: Backend>(
    op: &'static str,
    item: usize,
    indices: &Tensor<B, 1, Int>,
    low: i64,
    high: i64,
) -> GroupSelectResult<()> {
    let data = indices.clone().into_data();
    let found = data.iter::<i64>().find(|&i| i < low || i >= high);
    match found {
        Some(index) => Err(GroupSelectError::IndexOutOfRange {
            op,
            item,
            index,
            low,
            high,
        }),
        None => Ok(()),
    }
}
