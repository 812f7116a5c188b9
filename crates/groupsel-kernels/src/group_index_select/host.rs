//! Host dispatcher for grouped gather/scatter.
//!
//! Walks the same warp grid as the CubeCL kernel, one warp at a time, reading
//! every base, offset and column count out of the packed `u32` words. The
//! result is bit-identical to a device launch for `Select`; `Add` sums in warp
//! order instead of atomic arrival order.

use burn::tensor::backend::Backend;
use burn::tensor::ops::{FloatTensor, IntTensor};
use burn::tensor::{Int, Tensor, TensorData, TensorPrimitive};

use crate::{GroupLaunch, GroupMode};

/// Low word of slot `i` of the array starting at `word`.
fn slot(words: &[u32], word: u32, i: u32) -> u32 {
    words[(word + 2 * i) as usize]
}

/// Item, row and column range owned by one warp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WarpWork {
    pub item: u32,
    pub row: u32,
    pub col_start: u32,
    pub col_end: u32,
    pub num_cols: u32,
}

/// Last item whose range starts at or before `warp`, by bisection over the
/// warp offsets. Empty items share their start with the next item and lose.
fn find_item(args: &[u32], offsets_word: u32, group_size: u32, warp: u32) -> u32 {
    let mut lo = 0;
    let mut hi = group_size;
    while lo + 1 < hi {
        let mid = (lo + hi) / 2;
        if slot(args, offsets_word, mid) <= warp {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Device warp mapping, evaluated on the host.
pub(crate) fn warp_work(args: &[u32], launch: &GroupLaunch, warp: u32) -> WarpWork {
    let offsets = launch.warp_offsets_word();
    let cols = launch.num_cols_word() as usize;

    let (item, num_cols) = if launch.use_var_cols {
        let item = find_item(args, offsets, launch.group_size(), warp);
        (item, args[cols + item as usize])
    } else {
        let warps_per_item = slot(args, offsets, 1);
        (warp / warps_per_item, args[cols])
    };

    let warps_per_row = num_cols.div_ceil(launch.cols_per_warp);
    let local = warp - slot(args, offsets, item);
    let col_start = (local % warps_per_row) * launch.cols_per_warp;

    WarpWork {
        item,
        row: local / warps_per_row,
        col_start,
        col_end: (col_start + launch.cols_per_warp).min(num_cols),
        num_cols,
    }
}

pub(crate) fn dispatch<B: Backend>(
    args: &[u32],
    io_args: &[u32],
    launch: GroupLaunch,
    mode: GroupMode,
    src: FloatTensor<B>,
    indices: IntTensor<B>,
    dst: FloatTensor<B>,
) -> FloatTensor<B> {
    let src: Tensor<B, 1> = Tensor::from_primitive(TensorPrimitive::Float(src));
    let indices: Tensor<B, 1, Int> = Tensor::from_primitive(indices);
    let dst: Tensor<B, 1> = Tensor::from_primitive(TensorPrimitive::Float(dst));
    let device = dst.device();

    let src: Vec<f32> = src.into_data().iter::<f32>().collect();
    let indices: Vec<i64> = indices.into_data().iter::<i64>().collect();
    let mut out: Vec<f32> = dst.into_data().iter::<f32>().collect();

    for warp in 0..launch.total_warps {
        let work = warp_work(args, &launch, warp);
        let src_base = slot(io_args, launch.src_word(), work.item) as usize;
        let dst_base = slot(io_args, launch.dst_word(), work.item) as usize;
        let idx_base = slot(args, launch.index_word(), work.item) as usize;

        let index = indices[idx_base + work.row as usize];
        assert!(
            index >= 0,
            "negative index {index} reached the dispatcher for item {}",
            work.item
        );
        let num_cols = work.num_cols as usize;
        let (src_row, dst_row) = match mode {
            GroupMode::Select => (index as usize, work.row as usize),
            GroupMode::Add => (work.row as usize, index as usize),
        };

        for col in work.col_start as usize..work.col_end as usize {
            let from = src_base + src_row * num_cols + col;
            let to = dst_base + dst_row * num_cols + col;
            match mode {
                GroupMode::Select => out[to] = src[from],
                GroupMode::Add => out[to] += src[from],
            }
        }
    }

    let len = out.len();
    Tensor::<B, 1>::from_data(TensorData::new(out, [len]), &device)
        .into_primitive()
        .tensor()
}
