//! Grouped index-select with a fused forward gather and backward scatter-add.
//!
//! Instead of one `select` per item:
//! 1. Every item is packed into a flat per-call arena
//! 2. A warp plan balances items of unequal width
//! 3. One packed argument buffer is staged
//! 4. One dispatch serves the whole group
//!
//! The backward pass mirrors this with one zero-filled gradient arena and an
//! atomic scatter-add.

pub(crate) mod backward;
mod forward;
pub(crate) mod host;

#[cfg(feature = "gpu")]
pub mod kernel;
#[cfg(feature = "gpu")]
pub(crate) mod launch;

pub use backward::{GroupGradients, GroupIndexSelectState};
pub use forward::{group_index_select, group_index_select_forward};
