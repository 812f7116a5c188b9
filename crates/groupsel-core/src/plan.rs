//! Warp budget planning for grouped gather/scatter.
//!
//! Each output row of an item is split into chunks of at most
//! `cols_per_warp` columns and every chunk is handled by one warp. Items of
//! different widths therefore consume different numbers of warps; the plan
//! records a prefix sum so that a flat warp id can be mapped back to
//! `(item, row, chunk)`.
//!
//! ```text
//! item:          0            1        2
//! warps:   [ 0 .. 6 )   [ 6 .. 9 )  [ 9 .. 15 )
//! offsets:   0            6         9          15
//! ```

use crate::shape::ItemShape;

/// Threads per warp on the device side.
pub const WARP_SIZE: u32 = 32;

/// Default number of columns one warp processes per row chunk.
pub const DEFAULT_COLS_PER_WARP: usize = 256;

/// Number of warps needed to cover `num_cols` columns of one row.
pub fn warps_per_row(num_cols: usize, cols_per_warp: usize) -> usize {
    num_cols.div_ceil(cols_per_warp)
}

/// The unit of work owned by a single warp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarpTask {
    pub item: usize,
    pub row: usize,
    pub chunk: usize,
}

/// Warp distribution for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarpPlan {
    warp_offsets: Vec<u64>,
    num_cols: Vec<usize>,
    num_output_rows: usize,
    cols_per_warp: usize,
    use_var_cols: bool,
}

impl WarpPlan {
    /// Plan a group whose items all select `num_output_rows` rows.
    ///
    /// # Panics
    ///
    /// Panics if `cols_per_warp` is zero.
    pub fn new(items: &[ItemShape], num_output_rows: usize, cols_per_warp: usize) -> Self {
        assert!(cols_per_warp > 0, "cols_per_warp must be positive");

        let mut warp_offsets = Vec::with_capacity(items.len() + 1);
        let mut num_cols = Vec::with_capacity(items.len());
        let mut warp_offset = 0u64;

        for item in items {
            let cols = item.num_cols();
            warp_offsets.push(warp_offset);
            num_cols.push(cols);
            warp_offset += (warps_per_row(cols, cols_per_warp) * num_output_rows) as u64;
        }
        warp_offsets.push(warp_offset);

        let use_var_cols = num_cols.windows(2).any(|w| w[0] != w[1]);

        Self {
            warp_offsets,
            num_cols,
            num_output_rows,
            cols_per_warp,
            use_var_cols,
        }
    }

    pub fn group_size(&self) -> usize {
        self.num_cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_cols.is_empty()
    }

    /// Prefix sums of warps per item, `group_size + 1` entries.
    pub fn warp_offsets(&self) -> &[u64] {
        &self.warp_offsets
    }

    /// Column width per item.
    pub fn num_cols(&self) -> &[usize] {
        &self.num_cols
    }

    pub fn total_warps(&self) -> u64 {
        self.warp_offsets[self.warp_offsets.len() - 1]
    }

    pub fn num_output_rows(&self) -> usize {
        self.num_output_rows
    }

    pub fn cols_per_warp(&self) -> usize {
        self.cols_per_warp
    }

    /// True iff at least two items differ in column width.
    pub fn use_var_cols(&self) -> bool {
        self.use_var_cols
    }

    /// Warps consumed by item `i`.
    pub fn warps(&self, i: usize) -> u64 {
        self.warp_offsets[i + 1] - self.warp_offsets[i]
    }

    pub fn warps_per_row(&self, i: usize) -> usize {
        warps_per_row(self.num_cols[i], self.cols_per_warp)
    }

    /// Map a flat warp id to the item, row and column chunk it processes.
    ///
    /// Returns `None` for warps past the end of the plan.
    pub fn locate(&self, warp: u64) -> Option<WarpTask> {
        if warp >= self.total_warps() {
            return None;
        }
        // Last item whose range starts at or before `warp`; empty items share
        // their start with the next one and are skipped.
        let item = self.warp_offsets.partition_point(|&offset| offset <= warp) - 1;
        let local = (warp - self.warp_offsets[item]) as usize;
        let per_row = self.warps_per_row(item);

        Some(WarpTask {
            item,
            row: local / per_row,
            chunk: local % per_row,
        })
    }

    /// Column range covered by a chunk of item `i`.
    pub fn chunk_cols(&self, i: usize, chunk: usize) -> std::ops::Range<usize> {
        let start = chunk * self.cols_per_warp;
        let end = (start + self.cols_per_warp).min(self.num_cols[i]);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes(dims: &[&[usize]]) -> Vec<ItemShape> {
        dims.iter()
            .map(|d| ItemShape::new(d.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_warps_per_row() {
        assert_eq!(warps_per_row(0, 4), 0);
        assert_eq!(warps_per_row(1, 4), 1);
        assert_eq!(warps_per_row(4, 4), 1);
        assert_eq!(warps_per_row(5, 4), 2);
    }

    #[test]
    fn test_offsets_prefix_sum() {
        let items = shapes(&[&[4, 3], &[4, 5], &[10, 8]]);
        let plan = WarpPlan::new(&items, 3, 4);

        // 1, 2 and 2 warps per row over 3 rows
        assert_eq!(plan.warp_offsets(), &[0, 3, 9, 15]);
        assert_eq!(plan.total_warps(), 15);
        let sum: u64 = (0..plan.group_size()).map(|i| plan.warps(i)).sum();
        assert_eq!(sum, plan.total_warps());
        assert!(plan.use_var_cols());
    }

    #[test]
    fn test_uniform_columns_flag() {
        let items = shapes(&[&[4, 3], &[7, 3], &[2, 3]]);
        assert!(!WarpPlan::new(&items, 5, 4).use_var_cols());

        let items = shapes(&[&[4, 3], &[7, 3], &[2, 2]]);
        assert!(WarpPlan::new(&items, 5, 4).use_var_cols());
    }

    #[test]
    fn test_empty_plan() {
        let plan = WarpPlan::new(&[], 0, 256);
        assert!(plan.is_empty());
        assert_eq!(plan.warp_offsets(), &[0]);
        assert_eq!(plan.total_warps(), 0);
        assert!(!plan.use_var_cols());
        assert_eq!(plan.locate(0), None);
    }

    #[test]
    fn test_locate_skips_empty_items() {
        // Middle item has no columns and therefore no warps
        let items = shapes(&[&[2, 2], &[2, 0], &[2, 6]]);
        let plan = WarpPlan::new(&items, 2, 4);
        assert_eq!(plan.warp_offsets(), &[0, 2, 2, 6]);

        assert_eq!(
            plan.locate(1),
            Some(WarpTask {
                item: 0,
                row: 1,
                chunk: 0
            })
        );
        assert_eq!(
            plan.locate(2),
            Some(WarpTask {
                item: 2,
                row: 0,
                chunk: 0
            })
        );
        assert_eq!(
            plan.locate(5),
            Some(WarpTask {
                item: 2,
                row: 1,
                chunk: 1
            })
        );
        assert_eq!(plan.locate(6), None);
        assert_eq!(plan.chunk_cols(2, 1), 4..6);
    }

    #[test]
    fn test_every_warp_maps_once() {
        let items = shapes(&[&[9, 7], &[3, 1], &[5, 13]]);
        let plan = WarpPlan::new(&items, 6, 4);

        let mut covered = vec![vec![vec![false; 13]; 6]; 3];
        for w in 0..plan.total_warps() {
            let task = plan.locate(w).unwrap();
            for col in plan.chunk_cols(task.item, task.chunk) {
                assert!(!covered[task.item][task.row][col]);
                covered[task.item][task.row][col] = true;
            }
        }
        for (i, item) in items.iter().enumerate() {
            for row in &covered[i] {
                assert!(row[..item.num_cols()].iter().all(|&c| c));
            }
        }
    }
}
