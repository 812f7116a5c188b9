//! Item shapes and per-call arena layouts.
//!
//! An item's input is viewed as a `[num_rows, num_cols]` matrix where
//! `num_cols` is the product of every trailing dimension. Items of a group are
//! laid out back to back in arenas; an item's "address" is the element offset
//! of its first value inside the arena.

use std::ops::Range;

use crate::error::{GroupSelectError, GroupSelectResult};

/// Shape of one group item's input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemShape {
    dims: Vec<usize>,
}

impl ItemShape {
    /// Create an item shape. Rank 0 is rejected.
    pub fn new(dims: Vec<usize>) -> GroupSelectResult<Self> {
        if dims.is_empty() {
            return Err(GroupSelectError::ScalarInput { op: "item_shape" });
        }
        Ok(Self { dims })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// First dimension.
    pub fn num_rows(&self) -> usize {
        self.dims[0]
    }

    /// Product of the trailing dimensions (1 for rank-1 inputs).
    pub fn num_cols(&self) -> usize {
        self.dims[1..].iter().product()
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Same trailing dimensions with a different row count.
    pub fn with_rows(&self, num_rows: usize) -> ItemShape {
        let mut dims = self.dims.clone();
        dims[0] = num_rows;
        ItemShape { dims }
    }
}

/// Flattened shapes of a whole group, all of the same rank.
///
/// This is the form saved between the forward and backward passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatShapes {
    rank: usize,
    dims: Vec<usize>,
}

impl FlatShapes {
    /// Flatten item shapes; every item must share the rank of the first one.
    pub fn from_items(items: &[ItemShape]) -> GroupSelectResult<Self> {
        let rank = items.first().map(ItemShape::rank).unwrap_or(0);
        let mut dims = Vec::with_capacity(items.len() * rank);

        for (item, shape) in items.iter().enumerate() {
            if shape.rank() != rank {
                return Err(GroupSelectError::RankMismatch {
                    op: "group_index_select",
                    item,
                    expected: rank,
                    got: shape.rank(),
                });
            }
            dims.extend_from_slice(shape.dims());
        }

        Ok(Self { rank, dims })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        if self.rank == 0 {
            0
        } else {
            self.dims.len() / self.rank
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensions of item `i`.
    pub fn item(&self, i: usize) -> &[usize] {
        &self.dims[i * self.rank..(i + 1) * self.rank]
    }

    pub fn num_elements(&self, i: usize) -> usize {
        self.item(i).iter().product()
    }

    pub fn total_elements(&self) -> usize {
        (0..self.len()).map(|i| self.num_elements(i)).sum()
    }

    pub fn to_items(&self) -> Vec<ItemShape> {
        (0..self.len())
            .map(|i| ItemShape {
                dims: self.item(i).to_vec(),
            })
            .collect()
    }
}

/// Element ranges of group items packed back to back in one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaLayout {
    bases: Vec<u64>,
    sizes: Vec<usize>,
    total: usize,
}

impl ArenaLayout {
    pub fn from_sizes<I: IntoIterator<Item = usize>>(sizes: I) -> Self {
        let sizes: Vec<usize> = sizes.into_iter().collect();
        let mut bases = Vec::with_capacity(sizes.len());
        let mut total = 0usize;
        for &size in &sizes {
            bases.push(total as u64);
            total += size;
        }
        Self {
            bases,
            sizes,
            total,
        }
    }

    /// Element offsets of every item.
    pub fn bases(&self) -> &[u64] {
        &self.bases
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn range(&self, i: usize) -> Range<usize> {
        let start = self.bases[i] as usize;
        start..start + self.sizes[i]
    }

    /// Total number of elements.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_shape_cols() {
        let shape = ItemShape::new(vec![4, 3, 2]).unwrap();
        assert_eq!(shape.num_rows(), 4);
        assert_eq!(shape.num_cols(), 6);
        assert_eq!(shape.num_elements(), 24);
        assert_eq!(shape.with_rows(7).dims(), &[7, 3, 2]);

        let vector = ItemShape::new(vec![5]).unwrap();
        assert_eq!(vector.num_cols(), 1);

        // Zero rows still reports the trailing width
        let empty = ItemShape::new(vec![0, 8]).unwrap();
        assert_eq!(empty.num_cols(), 8);
        assert_eq!(empty.num_elements(), 0);
    }

    #[test]
    fn test_scalar_rejected() {
        assert!(ItemShape::new(vec![]).is_err());
    }

    #[test]
    fn test_flat_shapes_round_trip() {
        let items = vec![
            ItemShape::new(vec![4, 3]).unwrap(),
            ItemShape::new(vec![4, 5]).unwrap(),
        ];
        let flat = FlatShapes::from_items(&items).unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat.item(1), &[4, 5]);
        assert_eq!(flat.total_elements(), 32);
        assert_eq!(flat.to_items(), items);
    }

    #[test]
    fn test_flat_shapes_rank_mismatch() {
        let items = vec![
            ItemShape::new(vec![4, 3]).unwrap(),
            ItemShape::new(vec![4, 5, 1]).unwrap(),
        ];
        let err = FlatShapes::from_items(&items).unwrap_err();
        assert!(matches!(err, GroupSelectError::RankMismatch { item: 1, .. }));
    }

    #[test]
    fn test_empty_flat_shapes() {
        let flat = FlatShapes::from_items(&[]).unwrap();
        assert!(flat.is_empty());
        assert_eq!(flat.total_elements(), 0);
    }

    #[test]
    fn test_arena_layout() {
        let arena = ArenaLayout::from_sizes([12, 0, 20]);
        assert_eq!(arena.bases(), &[0, 12, 12]);
        assert_eq!(arena.range(2), 12..32);
        assert_eq!(arena.total(), 32);
    }
}
