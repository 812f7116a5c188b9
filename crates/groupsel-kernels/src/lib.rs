//! # groupsel-kernels
//!
//! Fused grouped gather/scatter for Burn backends.
//!
//! A *group* is a list of `(input, indices)` pairs that select the same number
//! of rows but may differ in column width. Instead of one launch per item the
//! whole group is served by a single launch: item tensors are packed into
//! per-call arenas, a warp plan spreads the work, and one packed argument
//! buffer tells every warp where its item lives.
//!
//! ## Available Operations
//!
//! - `group_index_select` - Grouped row gather with a typed backward pass
//! - `index_select` - Single-tensor gather with sort-for-locality
//! - `pack_segments` - Variable-length segments to a padded batch
//!
//! ## Architecture
//!
//! 1. [`GroupSelectBackend`] extends Burn's `Backend` with the device entry points
//! 2. `NdArray` implements it with a host loop that mirrors the device mapping
//! 3. `CubeBackend` implements it with CubeCL kernels (`gpu` feature)
//! 4. The op wrappers stay generic over the backend and return a saved state
//!    that the backward pass consumes by value

#![cfg_attr(not(feature = "gpu"), allow(unused))]

use std::fmt::Debug;

use burn::tensor::backend::Backend as BurnBackend;
use burn::tensor::ops::{FloatTensor, IntTensor};
use groupsel_core::args::{ArgArray, ArgLayout, IoSlots};
use groupsel_core::error::GroupSelectResult;
use groupsel_core::plan::WarpPlan;
use groupsel_core::segments::SegmentLayout;
use groupsel_core::check_device_range;

// ============================================================================
// Dispatch Description
// ============================================================================

/// Whether the dispatcher gathers or scatter-accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// `dst[i][r][:] = src[i][idx[i][r]][:]`
    Select,
    /// `dst[i][idx[i][r]][:] += src[i][r][:]`, duplicate indices sum.
    Add,
}

/// Launch scalars shared by the forward and backward dispatch of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLaunch {
    pub layout: ArgLayout,
    pub io_slots: IoSlots,
    pub num_output_rows: u32,
    pub total_warps: u32,
    pub cols_per_warp: u32,
    pub use_var_cols: bool,
}

impl GroupLaunch {
    pub fn new(plan: &WarpPlan, layout: ArgLayout, io_slots: IoSlots) -> GroupSelectResult<Self> {
        Ok(Self {
            layout,
            io_slots,
            num_output_rows: check_device_range("output rows", plan.num_output_rows() as u64)?,
            total_warps: check_device_range("total warps", plan.total_warps())?,
            cols_per_warp: check_device_range("cols per warp", plan.cols_per_warp() as u64)?,
            use_var_cols: plan.use_var_cols(),
        })
    }

    /// Same plan, different source/destination tables.
    pub fn with_io_slots(self, io_slots: IoSlots) -> Self {
        Self { io_slots, ..self }
    }

    pub fn group_size(&self) -> u32 {
        self.layout.group_size() as u32
    }

    pub fn index_word(&self) -> u32 {
        self.layout.word_offset(ArgArray::IndexBases)
    }

    pub fn warp_offsets_word(&self) -> u32 {
        self.layout.word_offset(ArgArray::WarpOffsets)
    }

    pub fn num_cols_word(&self) -> u32 {
        self.layout.word_offset(ArgArray::NumCols)
    }

    pub fn src_word(&self) -> u32 {
        (self.io_slots.src * 2) as u32
    }

    pub fn dst_word(&self) -> u32 {
        (self.io_slots.dst * 2) as u32
    }
}

/// Everything the dispatcher needs besides the tensors.
///
/// `args` holds indices, warp offsets and column counts; `io_args` holds the
/// source/destination bases. In the forward pass both are the same buffer.
pub struct GroupDispatch<'a, B: GroupSelectBackend> {
    pub args: &'a B::ArgBuffer,
    pub io_args: &'a B::ArgBuffer,
    pub launch: GroupLaunch,
    pub mode: GroupMode,
}

// ============================================================================
// Custom Backend Trait
// ============================================================================

/// Custom backend trait for grouped gather/scatter.
///
/// - `CubeBackend` implements this with CubeCL kernels (`gpu` feature)
/// - `NdArray` implements this with the host reference loop
pub trait GroupSelectBackend: BurnBackend {
    /// Device-resident packed argument buffer.
    type ArgBuffer: Clone + Debug + Send + Sync;

    /// Single host to device copy of a packed argument buffer.
    fn stage_args(words: &[u32], device: &Self::Device) -> Self::ArgBuffer;

    /// Grouped gather or scatter-accumulate over flat arenas.
    ///
    /// # Arguments
    /// * `dispatch` - Staged argument buffers, launch scalars and mode
    /// * `src` - Source arena (inputs for `Select`, grad outputs for `Add`)
    /// * `indices` - Index arena, `num_output_rows` entries per item
    /// * `dst` - Destination arena, zero-filled for `Add`
    ///
    /// # Returns
    /// The destination arena
    fn group_index_select_or_add(
        dispatch: GroupDispatch<'_, Self>,
        src: FloatTensor<Self>,
        indices: IntTensor<Self>,
        dst: FloatTensor<Self>,
    ) -> FloatTensor<Self>;

    /// Pack a flat `[total_rows * num_cols]` input into
    /// `[num_segments * max_length * num_cols]`, zero-padding short segments.
    fn pack_segments(input: FloatTensor<Self>, segments: &SegmentLayout) -> FloatTensor<Self>;

    /// Inverse of [`pack_segments`](Self::pack_segments); truncated rows get zeros.
    fn unpack_segments(packed: FloatTensor<Self>, segments: &SegmentLayout) -> FloatTensor<Self>;
}

// ============================================================================
// Operation Modules
// ============================================================================

pub mod group_index_select;
pub mod index_select;
pub mod pack_segments;

mod arena;
mod grid;

pub use group_index_select::{
    group_index_select, group_index_select_forward, GroupGradients, GroupIndexSelectState,
};
pub use index_select::{index_select, index_select_dim0, IndexSelectState};
pub use pack_segments::{pack_segments, PackSegmentsState};

// ============================================================================
// Reference Implementations
// ============================================================================

pub mod reference {
    //! Per-item loops built from standard tensor operations.
    //!
    //! Used to validate the fused dispatch and as the baseline in benchmarks.

    use burn::tensor::{backend::Backend, Int, Tensor};

    /// One `select` per item.
    pub fn group_index_select<B: Backend, const D: usize>(
        inputs: &[Tensor<B, D>],
        indices: &[Tensor<B, 1, Int>],
    ) -> Vec<Tensor<B, D>> {
        inputs
            .iter()
            .zip(indices)
            .map(|(input, idx)| input.clone().select(0, idx.clone()))
            .collect()
    }

    /// One `select_assign` per item into zeros of the input shape.
    pub fn group_index_add<B: Backend, const D: usize>(
        input_shapes: &[[usize; D]],
        indices: &[Tensor<B, 1, Int>],
        grad_outputs: &[Tensor<B, D>],
    ) -> Vec<Tensor<B, D>> {
        input_shapes
            .iter()
            .zip(indices)
            .zip(grad_outputs)
            .map(|((&shape, idx), grad)| {
                Tensor::<B, D>::zeros(shape, &grad.device()).select_assign(
                    0,
                    idx.clone(),
                    grad.clone(),
                )
            })
            .collect()
    }
}

// ============================================================================
// Host Backend Implementation
// ============================================================================

mod ndarray_impl {
    use std::sync::Arc;

    use super::{GroupDispatch, GroupSelectBackend};
    use burn::backend::NdArray;
    use burn::tensor::ops::{FloatTensor, IntTensor};
    use groupsel_core::segments::SegmentLayout;

    impl GroupSelectBackend for NdArray {
        type ArgBuffer = Arc<[u32]>;

        fn stage_args(words: &[u32], _device: &Self::Device) -> Self::ArgBuffer {
            Arc::from(words)
        }

        fn group_index_select_or_add(
            dispatch: GroupDispatch<'_, Self>,
            src: FloatTensor<Self>,
            indices: IntTensor<Self>,
            dst: FloatTensor<Self>,
        ) -> FloatTensor<Self> {
            crate::group_index_select::host::dispatch::<Self>(
                dispatch.args,
                dispatch.io_args,
                dispatch.launch,
                dispatch.mode,
                src,
                indices,
                dst,
            )
        }

        fn pack_segments(input: FloatTensor<Self>, segments: &SegmentLayout) -> FloatTensor<Self> {
            crate::pack_segments::host::pack::<Self>(input, segments)
        }

        fn unpack_segments(
            packed: FloatTensor<Self>,
            segments: &SegmentLayout,
        ) -> FloatTensor<Self> {
            crate::pack_segments::host::unpack::<Self>(packed, segments)
        }
    }
}

// ============================================================================
// CubeBackend Implementation
// ============================================================================

#[cfg(feature = "gpu")]
mod cube_impl {
    use super::{GroupDispatch, GroupSelectBackend};
    use burn::tensor::ops::{FloatTensor, IntTensor};
    use burn_cubecl::{
        element::BoolElement, tensor::CubeTensor, CubeBackend, CubeRuntime, FloatElement,
        IntElement,
    };
    use groupsel_core::segments::SegmentLayout;

    impl<R: CubeRuntime, F: FloatElement, I: IntElement, BT: BoolElement> GroupSelectBackend
        for CubeBackend<R, F, I, BT>
    {
        type ArgBuffer = CubeTensor<R>;

        fn stage_args(words: &[u32], device: &Self::Device) -> Self::ArgBuffer {
            crate::group_index_select::launch::stage_words::<R>(words, device)
        }

        fn group_index_select_or_add(
            dispatch: GroupDispatch<'_, Self>,
            src: FloatTensor<Self>,
            indices: IntTensor<Self>,
            dst: FloatTensor<Self>,
        ) -> FloatTensor<Self> {
            crate::group_index_select::launch::launch_group_index_select_or_add::<R, F, I, BT>(
                dispatch.args,
                dispatch.io_args,
                dispatch.launch,
                dispatch.mode,
                src,
                indices,
                dst,
            )
        }

        fn pack_segments(input: FloatTensor<Self>, segments: &SegmentLayout) -> FloatTensor<Self> {
            crate::pack_segments::launch::launch_pack_segments::<R, F, I, BT>(input, segments)
        }

        fn unpack_segments(
            packed: FloatTensor<Self>,
            segments: &SegmentLayout,
        ) -> FloatTensor<Self> {
            crate::pack_segments::launch::launch_unpack_segments::<R, F, I, BT>(packed, segments)
        }
    }
}
