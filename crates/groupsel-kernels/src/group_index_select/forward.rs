//! Forward pass for grouped index-select.
//!
//! 1. Validate arity, devices, output row count and rank
//! 2. Plan warps and pack every item's arena bases into one buffer
//! 3. Stage the buffer once and dispatch in `Select` mode
//! 4. Hand back per-item views of the output arena plus the saved state

use burn::tensor::{Int, Tensor, TensorPrimitive};
use groupsel_core::args::{check_device_range, IoSlots, PackedArgs};
use groupsel_core::config::GroupSelectConfig;
use groupsel_core::error::{GroupSelectError, GroupSelectResult};
use groupsel_core::plan::WarpPlan;
use groupsel_core::shape::{ArenaLayout, FlatShapes, ItemShape};

use super::backward::{GroupIndexSelectState, SavedGroup};
use crate::arena::{check_indices, flatten_into_arena, split_arena};
use crate::{GroupDispatch, GroupLaunch, GroupMode, GroupSelectBackend};

const OP: &str = "group_index_select";

/// Gather rows from every input of a group in a single dispatch.
///
/// `outputs[i] = inputs[i].select(0, indices[i])` for every item. All index
/// lists must have the same length; inputs may differ in trailing dimensions.
///
/// # Returns
/// One output per item and the state needed by
/// [`GroupIndexSelectState::backward`].
///
/// # Errors
/// Every precondition is checked before anything is staged on the device.
pub fn group_index_select_forward<B: GroupSelectBackend, const D: usize>(
    inputs: Vec<Tensor<B, D>>,
    indices: Vec<Tensor<B, 1, Int>>,
    config: &GroupSelectConfig,
) -> GroupSelectResult<(Vec<Tensor<B, D>>, GroupIndexSelectState<B, D>)> {
    if D == 0 {
        return Err(GroupSelectError::ScalarInput { op: OP });
    }
    if indices.len() != inputs.len() {
        return Err(GroupSelectError::ArityMismatch {
            op: OP,
            what: "index lists",
            expected: inputs.len(),
            got: indices.len(),
        });
    }
    if inputs.is_empty() {
        log::debug!("{OP}: empty group");
        return Ok((Vec::new(), GroupIndexSelectState::empty()));
    }

    let device = inputs[0].device();
    let num_output_rows = indices[0].dims()[0];

    let mut shapes = Vec::with_capacity(inputs.len());
    for (item, (input, idx)) in inputs.iter().zip(&indices).enumerate() {
        if input.device() != device || idx.device() != device {
            return Err(GroupSelectError::DeviceMismatch { op: OP, item });
        }
        let rows = idx.dims()[0];
        if rows != num_output_rows {
            return Err(GroupSelectError::RowCountMismatch {
                op: OP,
                item,
                expected: num_output_rows,
                got: rows,
            });
        }
        shapes.push(ItemShape::new(input.dims().to_vec())?);
    }
    let flat_shapes = FlatShapes::from_items(&shapes)?;

    if config.validate_indices() {
        for (item, (shape, idx)) in shapes.iter().zip(&indices).enumerate() {
            check_indices(OP, item, idx, 0, shape.num_rows() as i64)?;
        }
    }

    let plan = WarpPlan::new(&shapes, num_output_rows, config.cols_per_warp());
    let output_shapes: Vec<ItemShape> = shapes
        .iter()
        .map(|s| s.with_rows(num_output_rows))
        .collect();

    let input_arena = ArenaLayout::from_sizes(shapes.iter().map(ItemShape::num_elements));
    let output_arena = ArenaLayout::from_sizes(output_shapes.iter().map(ItemShape::num_elements));
    let index_arena = ArenaLayout::from_sizes(shapes.iter().map(|_| num_output_rows));
    check_device_range("input arena size", input_arena.total() as u64)?;
    check_device_range("output arena size", output_arena.total() as u64)?;

    let args = PackedArgs::build(
        &plan,
        input_arena.bases(),
        output_arena.bases(),
        index_arena.bases(),
    )?;
    let launch = GroupLaunch::new(&plan, *args.layout(), IoSlots::forward(args.layout()))?;

    log::debug!(
        "{OP}: group_size={} rows={} total_warps={} var_cols={}",
        plan.group_size(),
        num_output_rows,
        plan.total_warps(),
        plan.use_var_cols()
    );

    // Nothing fails past this point
    let staged = B::stage_args(args.as_words(), &device);
    let index_buf = if num_output_rows > 0 {
        Tensor::cat(indices, 0)
    } else {
        Tensor::<B, 1, Int>::zeros([0], &device)
    };
    let mut output_buf = Tensor::<B, 1>::empty([output_arena.total()], &device);

    if launch.total_warps > 0 {
        let src = flatten_into_arena(inputs);
        let dispatch = GroupDispatch {
            args: &staged,
            io_args: &staged,
            launch,
            mode: GroupMode::Select,
        };
        output_buf = Tensor::from_primitive(TensorPrimitive::Float(B::group_index_select_or_add(
            dispatch,
            src.into_primitive().tensor(),
            index_buf.clone().into_primitive(),
            output_buf.into_primitive().tensor(),
        )));
    }

    let outputs = split_arena(output_buf, &output_arena, &output_shapes);
    let state = GroupIndexSelectState::new(
        flat_shapes,
        SavedGroup {
            plan,
            launch,
            args: staged,
            input_arena,
            output_arena,
            indices: index_buf,
            device,
        },
    );

    Ok((outputs, state))
}

/// Forward-only grouped index-select using the global configuration.
pub fn group_index_select<B: GroupSelectBackend, const D: usize>(
    inputs: Vec<Tensor<B, D>>,
    indices: Vec<Tensor<B, 1, Int>>,
) -> GroupSelectResult<Vec<Tensor<B, D>>> {
    let (outputs, _state) = group_index_select_forward(inputs, indices, GroupSelectConfig::global())?;
    Ok(outputs)
}
