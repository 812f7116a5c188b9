//! Packed kernel arguments for grouped gather/scatter.
//!
//! All per-item metadata of a group travels to the device in a single buffer
//! of 64-bit slots, split into five arrays in this order:
//!
//! | array          | element | slots                           |
//! |----------------|---------|---------------------------------|
//! | input bases    | `u64`   | `group_size`                    |
//! | output bases   | `u64`   | `group_size`                    |
//! | index bases    | `u64`   | `group_size`                    |
//! | warp offsets   | `u64`   | `group_size + 1`                |
//! | column counts  | `u32`   | `ceil(group_size * 4 / 8)`      |
//!
//! Bases are element offsets into the per-call arenas. The device views the
//! same bytes as `u32` words: slot `s` is read through its low word `2 * s`
//! and column count `i` sits at word `2 * cols_slot + i`, which is why every
//! value has to fit in 32 bits.

use std::mem::size_of;

use crate::error::{GroupSelectError, GroupSelectResult};
use crate::plan::WarpPlan;

/// Storage unit of the packed buffer.
pub type ArgSlot = u64;

/// Per-item column count, packed at half the slot width.
pub type ColCount = u32;

/// Number of arrays in the packed buffer.
pub const NUM_ARGS: usize = 5;

const _: () = assert!(
    cfg!(target_endian = "little"),
    "packed kernel arguments assume a little-endian host"
);

/// The arrays stored in a [`PackedArgs`] buffer, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgArray {
    InputBases = 0,
    OutputBases = 1,
    IndexBases = 2,
    WarpOffsets = 3,
    NumCols = 4,
}

impl ArgArray {
    pub const ALL: [ArgArray; NUM_ARGS] = [
        ArgArray::InputBases,
        ArgArray::OutputBases,
        ArgArray::IndexBases,
        ArgArray::WarpOffsets,
        ArgArray::NumCols,
    ];
}

/// Slots needed to store `n` values of type `T` in [`ArgSlot`] units.
pub fn num_slots_for<T>(n: usize) -> usize {
    (n * size_of::<T>()).div_ceil(size_of::<ArgSlot>())
}

/// Slot offsets of every array for a given group size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgLayout {
    group_size: usize,
    offsets: [usize; NUM_ARGS + 1],
}

impl ArgLayout {
    pub fn new(group_size: usize) -> Self {
        let lengths = [
            group_size,
            group_size,
            group_size,
            group_size + 1,
            num_slots_for::<ColCount>(group_size),
        ];

        let mut offsets = [0usize; NUM_ARGS + 1];
        for (i, len) in lengths.iter().enumerate() {
            offsets[i + 1] = offsets[i] + len;
        }

        Self {
            group_size,
            offsets,
        }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// First slot of `array`.
    pub fn offset(&self, array: ArgArray) -> usize {
        self.offsets[array as usize]
    }

    /// Slots reserved for `array`.
    pub fn slots(&self, array: ArgArray) -> usize {
        self.offsets[array as usize + 1] - self.offsets[array as usize]
    }

    pub fn total_slots(&self) -> usize {
        self.offsets[NUM_ARGS]
    }

    pub fn total_bytes(&self) -> usize {
        self.total_slots() * size_of::<ArgSlot>()
    }

    /// First `u32` word of `array` in the device view.
    pub fn word_offset(&self, array: ArgArray) -> u32 {
        (self.offset(array) * 2) as u32
    }
}

/// Narrow a host offset or count to the 32-bit device word.
pub fn check_device_range(what: &'static str, value: u64) -> GroupSelectResult<u32> {
    u32::try_from(value).map_err(|_| GroupSelectError::OffsetOverflow { what, value })
}

/// Host-built argument buffer for one forward dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArgs {
    layout: ArgLayout,
    slots: Vec<ArgSlot>,
}

impl PackedArgs {
    /// Fill the buffer from a plan and the arena bases of every item.
    pub fn build(
        plan: &WarpPlan,
        input_bases: &[u64],
        output_bases: &[u64],
        index_bases: &[u64],
    ) -> GroupSelectResult<Self> {
        let group_size = plan.group_size();
        for (what, bases) in [
            ("input bases", input_bases),
            ("output bases", output_bases),
            ("index bases", index_bases),
        ] {
            if bases.len() != group_size {
                return Err(GroupSelectError::ArityMismatch {
                    op: "pack_args",
                    what,
                    expected: group_size,
                    got: bases.len(),
                });
            }
            for &base in bases {
                check_device_range(what, base)?;
            }
        }
        check_device_range("total warps", plan.total_warps())?;

        let layout = ArgLayout::new(group_size);
        let mut slots = vec![0 as ArgSlot; layout.total_slots()];

        let copy_into = |slots: &mut [ArgSlot], array: ArgArray, values: &[u64]| {
            let start = layout.offset(array);
            slots[start..start + values.len()].copy_from_slice(values);
        };
        copy_into(&mut slots, ArgArray::InputBases, input_bases);
        copy_into(&mut slots, ArgArray::OutputBases, output_bases);
        copy_into(&mut slots, ArgArray::IndexBases, index_bases);
        copy_into(&mut slots, ArgArray::WarpOffsets, plan.warp_offsets());

        let cols_start = layout.offset(ArgArray::NumCols);
        let cols_end = cols_start + layout.slots(ArgArray::NumCols);
        let cols: &mut [ColCount] = bytemuck::cast_slice_mut(&mut slots[cols_start..cols_end]);
        if cols.len() < group_size {
            return Err(GroupSelectError::InternalInvariant(format!(
                "{} column count words for {} items",
                cols.len(),
                group_size
            )));
        }
        for (dst, &num_cols) in cols.iter_mut().zip(plan.num_cols()) {
            *dst = check_device_range("column count", num_cols as u64)?;
        }

        log::trace!(
            "packed {} group args into {} bytes",
            group_size,
            layout.total_bytes()
        );

        Ok(Self { layout, slots })
    }

    pub fn layout(&self) -> &ArgLayout {
        &self.layout
    }

    pub fn group_size(&self) -> usize {
        self.layout.group_size()
    }

    fn array(&self, array: ArgArray) -> &[ArgSlot] {
        let start = self.layout.offset(array);
        &self.slots[start..start + self.layout.slots(array)]
    }

    pub fn input_bases(&self) -> &[u64] {
        self.array(ArgArray::InputBases)
    }

    pub fn output_bases(&self) -> &[u64] {
        self.array(ArgArray::OutputBases)
    }

    pub fn index_bases(&self) -> &[u64] {
        self.array(ArgArray::IndexBases)
    }

    pub fn warp_offsets(&self) -> &[u64] {
        self.array(ArgArray::WarpOffsets)
    }

    /// Column counts, without the padding of the last slot.
    pub fn num_cols(&self) -> &[ColCount] {
        let words: &[ColCount] = bytemuck::cast_slice(self.array(ArgArray::NumCols));
        &words[..self.group_size()]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.slots)
    }

    pub fn as_words(&self) -> &[u32] {
        bytemuck::cast_slice(&self.slots)
    }
}

/// Source/destination base tables read by the dispatcher.
///
/// The forward pass reads them from the input/output arrays of its
/// [`PackedArgs`]; the backward pass builds a separate two-array buffer for
/// the gradient arenas and keeps reusing the forward indices, warp offsets
/// and column counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoArgs {
    group_size: usize,
    slots: Vec<ArgSlot>,
}

impl IoArgs {
    pub fn new(src_bases: &[u64], dst_bases: &[u64]) -> GroupSelectResult<Self> {
        if src_bases.len() != dst_bases.len() {
            return Err(GroupSelectError::ArityMismatch {
                op: "pack_io_args",
                what: "destination bases",
                expected: src_bases.len(),
                got: dst_bases.len(),
            });
        }
        for &base in src_bases.iter().chain(dst_bases) {
            check_device_range("gradient base", base)?;
        }

        let mut slots = Vec::with_capacity(src_bases.len() * 2);
        slots.extend_from_slice(src_bases);
        slots.extend_from_slice(dst_bases);

        Ok(Self {
            group_size: src_bases.len(),
            slots,
        })
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn src_bases(&self) -> &[u64] {
        &self.slots[..self.group_size]
    }

    pub fn dst_bases(&self) -> &[u64] {
        &self.slots[self.group_size..]
    }

    pub fn slots(&self) -> IoSlots {
        IoSlots {
            src: 0,
            dst: self.group_size,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.slots)
    }

    pub fn as_words(&self) -> &[u32] {
        bytemuck::cast_slice(&self.slots)
    }
}

/// First slots of the source and destination base arrays inside an io buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoSlots {
    pub src: usize,
    pub dst: usize,
}

impl IoSlots {
    /// Forward reads inputs and writes outputs of the packed buffer itself.
    pub fn forward(layout: &ArgLayout) -> Self {
        Self {
            src: layout.offset(ArgArray::InputBases),
            dst: layout.offset(ArgArray::OutputBases),
        }
    }
}
