//! Segment geometry for packing variable-length runs of rows.
//!
//! A `[total_rows, ...]` input is split into consecutive segments of
//! `lengths[s]` rows. Packing copies segment `s` into slot `s` of a
//! `[num_segments, max_length, ...]` output; rows past `max_length` are
//! dropped and short segments are zero-padded.
//!
//! Both directions reduce to a row gather through a row map, where each
//! destination row names its source row or is zero-filled.

use crate::args::check_device_range;
use crate::error::{GroupSelectError, GroupSelectResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    lengths: Vec<usize>,
    offsets: Vec<usize>,
    total_rows: usize,
    num_cols: usize,
    max_length: usize,
}

impl SegmentLayout {
    /// Validate `lengths` against an input of `total_rows` rows.
    ///
    /// `max_length` of `None` packs to the longest segment.
    pub fn new(
        lengths: &[i64],
        total_rows: usize,
        num_cols: usize,
        max_length: Option<usize>,
    ) -> GroupSelectResult<Self> {
        let mut checked = Vec::with_capacity(lengths.len());
        let mut offsets = Vec::with_capacity(lengths.len());
        let mut offset = 0usize;

        for (s, &len) in lengths.iter().enumerate() {
            let len = usize::try_from(len).map_err(|_| GroupSelectError::InvalidSegmentLengths {
                reason: format!("segment {s} has negative length {len}"),
            })?;
            offsets.push(offset);
            checked.push(len);
            offset = offset
                .checked_add(len)
                .ok_or(GroupSelectError::OffsetOverflow {
                    what: "segment length sum",
                    value: u64::MAX,
                })?;
        }

        if offset != total_rows {
            return Err(GroupSelectError::InvalidSegmentLengths {
                reason: format!("lengths sum to {offset}, input has {total_rows} rows"),
            });
        }

        let max_length =
            max_length.unwrap_or_else(|| checked.iter().copied().max().unwrap_or(0));

        let packed_rows = checked_product("packed rows", &[lengths.len(), max_length])?;
        check_device_range("packed rows", packed_rows.saturating_add(1))?;
        check_device_range(
            "packed elements",
            checked_product("packed elements", &[lengths.len(), max_length, num_cols])?,
        )?;
        check_device_range(
            "input elements",
            checked_product("input elements", &[total_rows, num_cols])?,
        )?;

        Ok(Self {
            lengths: checked,
            offsets,
            total_rows,
            num_cols,
            max_length,
        })
    }

    pub fn num_segments(&self) -> usize {
        self.lengths.len()
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// First input row of every segment.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Rows of segment `s` that survive packing.
    pub fn kept_rows(&self, s: usize) -> usize {
        self.lengths[s].min(self.max_length)
    }

    pub fn packed_elements(&self) -> usize {
        self.num_segments() * self.max_length * self.num_cols
    }

    /// Source input row of every packed row, as `row + 1`; 0 marks padding.
    pub fn pack_rows(&self) -> Vec<u32> {
        let mut rows = vec![0u32; self.num_segments() * self.max_length];
        for s in 0..self.num_segments() {
            let dst = s * self.max_length;
            for t in 0..self.kept_rows(s) {
                rows[dst + t] = (self.offsets[s] + t + 1) as u32;
            }
        }
        rows
    }

    /// Source packed row of every input row, as `row + 1`; 0 marks a
    /// truncated row.
    pub fn unpack_rows(&self) -> Vec<u32> {
        let mut rows = vec![0u32; self.total_rows];
        for s in 0..self.num_segments() {
            let src = s * self.max_length;
            for t in 0..self.kept_rows(s) {
                rows[self.offsets[s] + t] = (src + t + 1) as u32;
            }
        }
        rows
    }
}

/// Product of `factors` as `u64`, or `OffsetOverflow` if it does not fit.
fn checked_product(what: &'static str, factors: &[usize]) -> GroupSelectResult<u64> {
    factors
        .iter()
        .try_fold(1u64, |acc, &f| acc.checked_mul(f as u64))
        .ok_or(GroupSelectError::OffsetOverflow {
            what,
            value: u64::MAX,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_and_default_max() {
        let layout = SegmentLayout::new(&[2, 0, 3], 5, 4, None).unwrap();
        assert_eq!(layout.offsets(), &[0, 2, 2]);
        assert_eq!(layout.max_length(), 3);
        assert_eq!(layout.packed_elements(), 3 * 3 * 4);
        assert_eq!(layout.pack_rows(), vec![1, 2, 0, 0, 0, 0, 3, 4, 5]);
        assert_eq!(layout.unpack_rows(), vec![1, 2, 7, 8, 9]);
    }

    #[test]
    fn test_truncation() {
        let layout = SegmentLayout::new(&[4, 1], 5, 1, Some(2)).unwrap();
        assert_eq!(layout.kept_rows(0), 2);
        assert_eq!(layout.kept_rows(1), 1);
        assert_eq!(layout.pack_rows(), vec![1, 2, 5, 0]);
        assert_eq!(layout.unpack_rows(), vec![1, 2, 0, 0, 3]);
    }

    #[test]
    fn test_negative_length() {
        let err = SegmentLayout::new(&[2, -1], 1, 1, None).unwrap_err();
        assert!(matches!(err, GroupSelectError::InvalidSegmentLengths { .. }));
    }

    #[test]
    fn test_sum_mismatch() {
        let err = SegmentLayout::new(&[2, 2], 5, 1, None).unwrap_err();
        assert!(err.to_string().contains("sum to 4"));
    }

    #[test]
    fn test_huge_max_length_rejected() {
        let err = SegmentLayout::new(&[1, 1], 2, 3, Some(usize::MAX / 2)).unwrap_err();
        assert!(matches!(err, GroupSelectError::OffsetOverflow { .. }));

        let err = SegmentLayout::new(&[1, 1], 2, 3, Some(1 << 31)).unwrap_err();
        assert!(matches!(
            err,
            GroupSelectError::OffsetOverflow {
                what: "packed rows",
                ..
            }
        ));
    }

    #[test]
    fn test_length_sum_overflow_rejected() {
        let err = SegmentLayout::new(&[i64::MAX, i64::MAX, 2], 0, 1, None).unwrap_err();
        assert!(matches!(
            err,
            GroupSelectError::OffsetOverflow {
                what: "segment length sum",
                ..
            }
        ));
    }
}
