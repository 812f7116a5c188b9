//! CubeCL kernels for grouped gather and scatter-accumulate.
//!
//! # Kernel Logic
//!
//! ```ignore
//! for each warp in parallel:
//!     item = last i with warp_offsets[i] <= warp   // bisection, or warp / warps_per_item
//!     local = warp - warp_offsets[item]
//!     row = local / warps_per_row(item)
//!     chunk = local % warps_per_row(item)
//!
//!     for col in chunk columns, strided by lane:
//!         select: dst[item][row][col]  = src[item][idx[item][row]][col]
//!         add:    dst[item][idx[item][row]][col] += src[item][row][col]
//! ```
//!
//! `args` is the packed argument buffer viewed as `u32` words; a 64-bit slot
//! is read through its low word. Bases are element offsets into the flat
//! `src`/`dst`/`indices` arenas.

use cubecl::{cube, prelude::*};

/// Item owning `warp` when column widths differ.
///
/// Bisection for the last item whose range starts at or before `warp`, which
/// skips items that own no warps.
#[cube]
fn find_item(args: &Tensor<u32>, warp_offsets_word: u32, group_size: u32, warp: u32) -> u32 {
    let mut lo = 0u32;
    let mut hi = group_size;
    loop {
        if lo + 1u32 >= hi {
            break;
        }
        let mid = (lo + hi) / 2u32;
        if args[warp_offsets_word + mid * 2u32] <= warp {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Linear warp id over a grid split along two cube dimensions.
#[cube]
fn warp_id() -> u32 {
    CUBE_POS * CUBE_DIM_Y + UNIT_POS_Y
}

/// Grouped row gather, one warp per `(item, row, column chunk)`.
///
/// # Arguments
/// * `src` - Flat input arena
/// * `indices` - Flat index arena
/// * `dst` - Flat output arena
/// * `args` - Packed indices bases, warp offsets and column counts
/// * `io_args` - Source and destination bases
/// * `use_var_cols` - Whether items differ in column width (comptime)
/// * `cols_per_warp` - Columns per chunk (comptime)
#[cube(launch)]
pub fn group_index_select_kernel<F: Float, I: Int>(
    src: &Tensor<F>,
    indices: &Tensor<I>,
    dst: &mut Tensor<F>,
    args: &Tensor<u32>,
    io_args: &Tensor<u32>,
    total_warps: u32,
    group_size: u32,
    index_word: u32,
    warp_offsets_word: u32,
    num_cols_word: u32,
    src_word: u32,
    dst_word: u32,
    #[comptime] use_var_cols: bool,
    #[comptime] cols_per_warp: u32,
) {
    let warp = warp_id();
    if warp >= total_warps {
        terminate!();
    }

    let mut item = 0u32;
    let mut num_cols = args[num_cols_word];
    if use_var_cols {
        item = find_item(args, warp_offsets_word, group_size, warp);
        num_cols = args[num_cols_word + item];
    } else {
        item = warp / args[warp_offsets_word + 2u32];
    }

    let warps_per_row = (num_cols + cols_per_warp - 1u32) / cols_per_warp;
    let local = warp - args[warp_offsets_word + item * 2u32];
    let row = local / warps_per_row;
    let col_start = (local % warps_per_row) * cols_per_warp;
    let col_end = u32::min(col_start + cols_per_warp, num_cols);

    let src_base = io_args[src_word + item * 2u32];
    let dst_base = io_args[dst_word + item * 2u32];
    let idx_base = args[index_word + item * 2u32];

    let src_row: u32 = u32::cast_from(indices[idx_base + row]);
    let src_offset = src_base + src_row * num_cols;
    let dst_offset = dst_base + row * num_cols;

    let mut col = col_start + UNIT_POS_X;
    loop {
        if col >= col_end {
            break;
        }
        dst[dst_offset + col] = src[src_offset + col];
        col += CUBE_DIM_X;
    }
}

/// Grouped row scatter-accumulate, the transpose of [`group_index_select_kernel`].
///
/// Rows selected several times receive the sum of their gradients through
/// atomic adds.
#[cube(launch)]
pub fn group_index_add_kernel<F: Float, I: Int>(
    src: &Tensor<F>,
    indices: &Tensor<I>,
    dst: &mut Tensor<Atomic<F>>,
    args: &Tensor<u32>,
    io_args: &Tensor<u32>,
    total_warps: u32,
    group_size: u32,
    index_word: u32,
    warp_offsets_word: u32,
    num_cols_word: u32,
    src_word: u32,
    dst_word: u32,
    #[comptime] use_var_cols: bool,
    #[comptime] cols_per_warp: u32,
) {
    let warp = warp_id();
    if warp >= total_warps {
        terminate!();
    }

    let mut item = 0u32;
    let mut num_cols = args[num_cols_word];
    if use_var_cols {
        item = find_item(args, warp_offsets_word, group_size, warp);
        num_cols = args[num_cols_word + item];
    } else {
        item = warp / args[warp_offsets_word + 2u32];
    }

    let warps_per_row = (num_cols + cols_per_warp - 1u32) / cols_per_warp;
    let local = warp - args[warp_offsets_word + item * 2u32];
    let row = local / warps_per_row;
    let col_start = (local % warps_per_row) * cols_per_warp;
    let col_end = u32::min(col_start + cols_per_warp, num_cols);

    let src_base = io_args[src_word + item * 2u32];
    let dst_base = io_args[dst_word + item * 2u32];
    let idx_base = args[index_word + item * 2u32];

    let dst_row: u32 = u32::cast_from(indices[idx_base + row]);
    let src_offset = src_base + row * num_cols;
    let dst_offset = dst_base + dst_row * num_cols;

    let mut col = col_start + UNIT_POS_X;
    loop {
        if col >= col_end {
            break;
        }
        Atomic::add(&dst[dst_offset + col], src[src_offset + col]);
        col += CUBE_DIM_X;
    }
}
