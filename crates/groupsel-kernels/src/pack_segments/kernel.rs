//! CubeCL kernel for segment packing and unpacking.

use cubecl::{cube, prelude::*};

/// Row gather through a row map, zero-filling unmapped rows.
///
/// One unit per destination element:
/// `dst[r][c] = rows[r] == 0 ? 0 : src[rows[r] - 1][c]`
///
/// Packing maps every padded slot to its input row; unpacking maps every
/// input row to its packed slot, leaving truncated rows at zero.
#[cube(launch)]
pub fn gather_rows_or_zero_kernel<F: Float>(
    src: &Tensor<F>,
    rows: &Tensor<u32>,
    dst: &mut Tensor<F>,
    num_elems: u32,
    num_cols: u32,
) {
    let pos = CUBE_POS * CUBE_DIM + UNIT_POS;
    if pos >= num_elems {
        terminate!();
    }

    let row = rows[pos / num_cols];
    if row == 0 {
        dst[pos] = F::new(0.0);
    } else {
        dst[pos] = src[(row - 1) * num_cols + pos % num_cols];
    }
}
