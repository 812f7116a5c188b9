//! Launch geometry shared by the CubeCL launchers.

/// Warps stacked along `CUBE_DIM_Y` in one cube.
pub(crate) const WARPS_PER_CUBE: u32 = 4;

/// Units per cube for elementwise kernels.
pub(crate) const ELEMWISE_CUBE_SIZE: u32 = 256;

/// Largest cube count along one dimension accepted by every runtime.
pub(crate) const MAX_CUBES_PER_DIM: u32 = 65_535;

/// Split a linear cube count over `(x, y)`.
///
/// Kernels recover the linear id from `CUBE_POS` and discard the overshoot.
pub(crate) fn split_cubes(num_cubes: u32) -> (u32, u32) {
    if num_cubes <= MAX_CUBES_PER_DIM {
        (num_cubes.max(1), 1)
    } else {
        (MAX_CUBES_PER_DIM, num_cubes.div_ceil(MAX_CUBES_PER_DIM))
    }
}

/// Cube grid for a warp-per-task kernel.
pub(crate) fn warp_cubes(total_warps: u32) -> (u32, u32) {
    split_cubes(total_warps.div_ceil(WARPS_PER_CUBE))
}

/// Cube grid for a unit-per-element kernel.
pub(crate) fn elemwise_cubes(num_elems: u32) -> (u32, u32) {
    split_cubes(num_elems.div_ceil(ELEMWISE_CUBE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_grid_is_one_dimensional() {
        assert_eq!(warp_cubes(1), (1, 1));
        assert_eq!(warp_cubes(9), (3, 1));
        assert_eq!(elemwise_cubes(257), (2, 1));
    }

    #[test]
    fn test_large_grid_covers_all_warps() {
        let total_warps = 4 * MAX_CUBES_PER_DIM + 17;
        let (x, y) = warp_cubes(total_warps);
        assert_eq!(x, MAX_CUBES_PER_DIM);
        assert!(u64::from(x) * u64::from(y) * u64::from(WARPS_PER_CUBE) >= u64::from(total_warps));
    }
}
