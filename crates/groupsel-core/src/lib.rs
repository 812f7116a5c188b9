//! # groupsel-core
//!
//! Host-side building blocks for grouped index-select: one coalesced
//! gather/scatter launch over a group of `(input, indices)` pairs that share
//! an output row count but not a column width.
//!
//! - [`ItemShape`], [`FlatShapes`], [`ArenaLayout`]: item geometry and the
//!   per-call arenas the items are packed into
//! - [`WarpPlan`]: warp budget per item and the prefix-sum offset table
//! - [`PackedArgs`], [`IoArgs`]: the single argument buffer staged to the device
//! - [`SegmentLayout`]: segment lengths for packing variable-length rows
//! - [`GroupSelectError`]: precondition and runtime errors
//! - [`GroupSelectConfig`]: CLI/env/TOML configuration
//! - [`ComputeBackend`]: host/accelerator routing
//!
//! ```rust,ignore
//! use groupsel_core::{ItemShape, PackedArgs, WarpPlan};
//!
//! let items = vec![ItemShape::new(vec![4, 3])?, ItemShape::new(vec![4, 5])?];
//! let plan = WarpPlan::new(&items, 3, 256);
//! let args = PackedArgs::build(&plan, &[0, 12], &[0, 9], &[0, 3])?;
//! assert_eq!(args.warp_offsets(), &[0, 3, 6]);
//! ```
//!
//! ## GPU Backend
//!
//! The `gpu` feature adds the WGPU backend alias:
//!
//! ```rust,ignore
//! use groupsel_core::backend::{init_gpu_device, WgpuBackend};
//!
//! let device = init_gpu_device();
//! ```

#![recursion_limit = "256"]

pub mod args;
pub mod backend;
pub mod compute;
pub mod config;
pub mod error;
pub mod plan;
pub mod segments;
pub mod shape;

pub use args::*;
pub use backend::*;
pub use compute::*;
pub use config::*;
pub use error::*;
pub use plan::*;
pub use segments::*;
pub use shape::*;
