//! Kernel launch logic for grouped gather/scatter on any CubeBackend.

use super::kernel::{group_index_add_kernel, group_index_select_kernel};
use crate::grid::{warp_cubes, WARPS_PER_CUBE};
use crate::{GroupLaunch, GroupMode};
use burn::tensor::ops::{FloatTensor, IntTensor};
use burn::tensor::{DType, Shape};
use burn_cubecl::{
    element::BoolElement, kernel::into_contiguous, tensor::CubeTensor, CubeBackend, CubeRuntime,
    FloatElement, IntElement,
};
use cubecl::prelude::ScalarArg;
use cubecl::{CubeCount, CubeDim};
use groupsel_core::plan::WARP_SIZE;

/// Upload packed argument words as a `u32` tensor.
pub fn stage_words<R: CubeRuntime>(words: &[u32], device: &R::Device) -> CubeTensor<R> {
    let client = R::client(device);
    let handle = client.create(bytemuck::cast_slice(words));
    log::trace!("staged {} argument words", words.len());

    CubeTensor::new_contiguous(
        client,
        device.clone(),
        Shape::from(vec![words.len()]),
        handle,
        DType::U32,
    )
}

/// Launch the grouped gather or scatter-accumulate kernel.
///
/// `dst` is written in place and returned.
pub fn launch_group_index_select_or_add<R, F, I, BT>(
    args: &CubeTensor<R>,
    io_args: &CubeTensor<R>,
    launch: GroupLaunch,
    mode: GroupMode,
    src: FloatTensor<CubeBackend<R, F, I, BT>>,
    indices: IntTensor<CubeBackend<R, F, I, BT>>,
    dst: FloatTensor<CubeBackend<R, F, I, BT>>,
) -> FloatTensor<CubeBackend<R, F, I, BT>>
where
    R: CubeRuntime,
    F: FloatElement,
    I: IntElement,
    BT: BoolElement,
{
    src.assert_is_on_same_device(&indices);
    src.assert_is_on_same_device(&dst);

    let src = into_contiguous(src);
    let indices = into_contiguous(indices);

    // Lanes along x, warps stacked along y
    let cube_dim = CubeDim {
        x: WARP_SIZE,
        y: WARPS_PER_CUBE,
        z: 1,
    };
    let (cubes_x, cubes_y) = warp_cubes(launch.total_warps);
    let cube_count = CubeCount::Static(cubes_x, cubes_y, 1);

    log::trace!(
        "{:?}: {} warps over {}x{} cubes, var_cols={}",
        mode,
        launch.total_warps,
        cubes_x,
        cubes_y,
        launch.use_var_cols
    );

    match mode {
        GroupMode::Select => {
            group_index_select_kernel::launch::<F, I, R>(
                &src.client,
                cube_count,
                cube_dim,
                src.as_tensor_arg::<F>(1),
                indices.as_tensor_arg::<I>(1),
                dst.as_tensor_arg::<F>(1),
                args.as_tensor_arg::<u32>(1),
                io_args.as_tensor_arg::<u32>(1),
                ScalarArg::new(launch.total_warps),
                ScalarArg::new(launch.group_size()),
                ScalarArg::new(launch.index_word()),
                ScalarArg::new(launch.warp_offsets_word()),
                ScalarArg::new(launch.num_cols_word()),
                ScalarArg::new(launch.src_word()),
                ScalarArg::new(launch.dst_word()),
                launch.use_var_cols,
                launch.cols_per_warp,
            );
        }
        GroupMode::Add => {
            group_index_add_kernel::launch::<F, I, R>(
                &src.client,
                cube_count,
                cube_dim,
                src.as_tensor_arg::<F>(1),
                indices.as_tensor_arg::<I>(1),
                dst.as_tensor_arg::<F>(1),
                args.as_tensor_arg::<u32>(1),
                io_args.as_tensor_arg::<u32>(1),
                ScalarArg::new(launch.total_warps),
                ScalarArg::new(launch.group_size()),
                ScalarArg::new(launch.index_word()),
                ScalarArg::new(launch.warp_offsets_word()),
                ScalarArg::new(launch.num_cols_word()),
                ScalarArg::new(launch.src_word()),
                ScalarArg::new(launch.dst_word()),
                launch.use_var_cols,
                launch.cols_per_warp,
            );
        }
    }

    dst
}
