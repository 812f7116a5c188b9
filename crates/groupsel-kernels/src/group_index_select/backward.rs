//! Backward pass for grouped index-select.
//!
//! # Gradient Computation
//!
//! ```ignore
//! grad_input[i] = zeros_like(input[i])
//! for r in 0..num_output_rows:
//!     grad_input[i][indices[i][r]] += grad_output[i][r]
//! ```
//!
//! All grad inputs share one zero-filled arena, sliced per item afterwards.
//! The dispatch reuses the forward buffer for indices, warp offsets and
//! column counts; only the grad output / grad input bases are staged anew.
//!
//! # Returned Slots
//!
//! Gradients line up with the forward arguments `(indices..., inputs..., group_size)`:
//! `group_size` empty slots, one gradient per input, one empty slot.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorPrimitive};
use groupsel_core::args::IoArgs;
use groupsel_core::error::{GroupSelectError, GroupSelectResult};
use groupsel_core::plan::WarpPlan;
use groupsel_core::shape::{ArenaLayout, FlatShapes};

use crate::arena::{flatten_into_arena, split_arena};
use crate::{GroupDispatch, GroupLaunch, GroupMode, GroupSelectBackend};

/// Everything the forward dispatch leaves behind for the backward one.
#[derive(Debug)]
pub(crate) struct SavedGroup<B: GroupSelectBackend> {
    pub plan: WarpPlan,
    pub launch: GroupLaunch,
    pub args: B::ArgBuffer,
    pub input_arena: ArenaLayout,
    pub output_arena: ArenaLayout,
    pub indices: Tensor<B, 1, Int>,
    pub device: B::Device,
}

/// Saved state of one grouped forward pass.
///
/// Owns the staged argument buffer and the index arena, so both stay alive
/// until [`backward`](Self::backward) consumes the state.
#[derive(Debug)]
#[must_use = "the saved state is required to run the backward pass"]
pub struct GroupIndexSelectState<B: GroupSelectBackend, const D: usize> {
    shapes: FlatShapes,
    saved: Option<SavedGroup<B>>,
}

impl<B: GroupSelectBackend, const D: usize> GroupIndexSelectState<B, D> {
    pub(crate) fn empty() -> Self {
        Self {
            shapes: FlatShapes::default(),
            saved: None,
        }
    }

    pub(crate) fn new(shapes: FlatShapes, saved: SavedGroup<B>) -> Self {
        Self {
            shapes,
            saved: Some(saved),
        }
    }

    pub fn group_size(&self) -> usize {
        self.shapes.len()
    }

    /// Input shapes of every item, flattened.
    pub fn input_shapes(&self) -> &FlatShapes {
        &self.shapes
    }

    /// `None` for an empty group.
    pub fn plan(&self) -> Option<&WarpPlan> {
        self.saved.as_ref().map(|s| &s.plan)
    }

    pub fn use_var_cols(&self) -> bool {
        self.saved.as_ref().is_some_and(|s| s.launch.use_var_cols)
    }

    /// Scatter-accumulate `grad_outputs` back onto the forward inputs.
    ///
    /// # Errors
    /// `GradientCountMismatch` unless there is exactly one gradient per item,
    /// `GradientShapeMismatch` if a gradient differs from its forward output.
    pub fn backward(self, grad_outputs: Vec<Tensor<B, D>>) -> GroupSelectResult<GroupGradients<B, D>> {
        let group_size = self.group_size();
        if grad_outputs.len() != group_size {
            return Err(GroupSelectError::GradientCountMismatch {
                expected: group_size,
                got: grad_outputs.len(),
            });
        }
        let Some(saved) = self.saved else {
            return Ok(GroupGradients::empty());
        };

        let num_output_rows = saved.plan.num_output_rows();
        let input_shapes = self.shapes.to_items();
        for (item, (grad, shape)) in grad_outputs.iter().zip(&input_shapes).enumerate() {
            let expected = shape.with_rows(num_output_rows);
            if grad.dims().as_slice() != expected.dims() {
                return Err(GroupSelectError::GradientShapeMismatch {
                    item,
                    expected: expected.dims().to_vec(),
                    got: grad.dims().to_vec(),
                });
            }
            if grad.device() != saved.device {
                return Err(GroupSelectError::DeviceMismatch {
                    op: "group_index_select_backward",
                    item,
                });
            }
        }

        let io = IoArgs::new(saved.output_arena.bases(), saved.input_arena.bases())?;
        let launch = saved.launch.with_io_slots(io.slots());

        log::debug!(
            "group_index_select_backward: group_size={} total_warps={}",
            group_size,
            launch.total_warps
        );

        let mut grad_buf = Tensor::<B, 1>::zeros([saved.input_arena.total()], &saved.device);
        if launch.total_warps > 0 {
            let io_staged = B::stage_args(io.as_words(), &saved.device);
            let grad_src = flatten_into_arena(grad_outputs);
            let dispatch = GroupDispatch {
                args: &saved.args,
                io_args: &io_staged,
                launch,
                mode: GroupMode::Add,
            };
            grad_buf = Tensor::from_primitive(TensorPrimitive::Float(B::group_index_select_or_add(
                dispatch,
                grad_src.into_primitive().tensor(),
                saved.indices.into_primitive(),
                grad_buf.into_primitive().tensor(),
            )));
        }

        let grads = split_arena(grad_buf, &saved.input_arena, &input_shapes);
        Ok(GroupGradients::from_input_grads(grads))
    }
}

/// Gradients of a grouped forward pass, one slot per forward argument.
#[derive(Debug)]
pub struct GroupGradients<B: Backend, const D: usize> {
    slots: Vec<Option<Tensor<B, D>>>,
}

impl<B: Backend, const D: usize> GroupGradients<B, D> {
    fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    fn from_input_grads(grads: Vec<Tensor<B, D>>) -> Self {
        let group_size = grads.len();
        let mut slots = Vec::with_capacity(2 * group_size + 1);
        slots.extend((0..group_size).map(|_| None));
        slots.extend(grads.into_iter().map(Some));
        slots.push(None);
        Self { slots }
    }

    /// Number of items the gradients were computed for.
    pub fn group_size(&self) -> usize {
        self.slots.len() / 2
    }

    /// `2 * group_size + 1`, or 0 for an empty group.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<Tensor<B, D>>] {
        &self.slots
    }

    /// Gradient with respect to input `i`.
    pub fn input_grad(&self, i: usize) -> Option<&Tensor<B, D>> {
        self.slots.get(self.group_size() + i)?.as_ref()
    }

    pub fn into_input_grads(self) -> Vec<Tensor<B, D>> {
        self.slots.into_iter().flatten().collect()
    }
}
