//! Kernel launch logic for segment packing on any CubeBackend.

use super::kernel::gather_rows_or_zero_kernel;
use crate::group_index_select::launch::stage_words;
use crate::grid::{elemwise_cubes, ELEMWISE_CUBE_SIZE};
use burn::tensor::ops::FloatTensor;
use burn::tensor::Shape;
use burn_cubecl::{
    element::BoolElement, kernel::into_contiguous, tensor::CubeTensor, CubeBackend, CubeRuntime,
    FloatElement, IntElement,
};
use cubecl::prelude::ScalarArg;
use cubecl::{CubeCount, CubeDim};
use groupsel_core::segments::SegmentLayout;

fn launch_gather_rows<R, F, I, BT>(
    src: FloatTensor<CubeBackend<R, F, I, BT>>,
    rows: &[u32],
    num_cols: usize,
) -> FloatTensor<CubeBackend<R, F, I, BT>>
where
    R: CubeRuntime,
    F: FloatElement,
    I: IntElement,
    BT: BoolElement,
{
    let src = into_contiguous(src);
    let rows = stage_words::<R>(rows, &src.device);

    let num_elems = rows.shape.num_elements() * num_cols;
    let buffer = src.client.empty(num_elems * core::mem::size_of::<F>());
    let dst = CubeTensor::new_contiguous(
        src.client.clone(),
        src.device.clone(),
        Shape::from(vec![num_elems]),
        buffer,
        F::dtype(),
    );

    let (cubes_x, cubes_y) = elemwise_cubes(num_elems as u32);
    log::trace!(
        "gather_rows: {} elements over {}x{} cubes",
        num_elems,
        cubes_x,
        cubes_y
    );

    gather_rows_or_zero_kernel::launch::<F, R>(
        &src.client,
        CubeCount::Static(cubes_x, cubes_y, 1),
        CubeDim {
            x: ELEMWISE_CUBE_SIZE,
            y: 1,
            z: 1,
        },
        src.as_tensor_arg::<F>(1),
        rows.as_tensor_arg::<u32>(1),
        dst.as_tensor_arg::<F>(1),
        ScalarArg::new(num_elems as u32),
        ScalarArg::new(num_cols as u32),
    );

    dst
}

/// Pack a flat input into a flat `[num_segments * max_length * num_cols]` batch.
pub fn launch_pack_segments<R, F, I, BT>(
    input: FloatTensor<CubeBackend<R, F, I, BT>>,
    segments: &SegmentLayout,
) -> FloatTensor<CubeBackend<R, F, I, BT>>
where
    R: CubeRuntime,
    F: FloatElement,
    I: IntElement,
    BT: BoolElement,
{
    launch_gather_rows::<R, F, I, BT>(input, &segments.pack_rows(), segments.num_cols())
}

/// Scatter a flat packed batch back to the input layout.
pub fn launch_unpack_segments<R, F, I, BT>(
    packed: FloatTensor<CubeBackend<R, F, I, BT>>,
    segments: &SegmentLayout,
) -> FloatTensor<CubeBackend<R, F, I, BT>>
where
    R: CubeRuntime,
    F: FloatElement,
    I: IntElement,
    BT: BoolElement,
{
    launch_gather_rows::<R, F, I, BT>(packed, &segments.unpack_rows(), segments.num_cols())
}
