//! Packing of variable-length segments into a padded batch.
//!
//! `[total_rows, ...]` rows split into runs of `lengths[s]` become a
//! `[num_segments, max_length, ...]` batch. Long segments are truncated,
//! short ones zero-padded. Both directions are a single row gather.

mod backward;
mod forward;
pub(crate) mod host;

#[cfg(feature = "gpu")]
pub mod kernel;
#[cfg(feature = "gpu")]
pub(crate) mod launch;

pub use backward::PackSegmentsState;
pub use forward::pack_segments;
