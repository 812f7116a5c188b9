//! Backend routing for grouped gather/scatter.
//!
//! Kernels exist for two backends: the host reference (`NdArray`) and the
//! CubeCL accelerator. Which one runs is an explicit configuration choice
//! rather than a registration side effect; callers that hold both backends use
//! [`ComputeBackend::run_routed`] to pick one per call.
//!
//! ```rust,ignore
//! use groupsel_core::{ComputeBackend, OpType};
//!
//! let backend = ComputeBackend::adaptive(1 << 16);
//! let outputs = backend.run_routed(
//!     OpType::GroupIndexSelect,
//!     Some(total_elements),
//!     || gpu_select(&inputs, &indices),
//!     || cpu_select(&inputs, &indices),
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operation classification used for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    /// Grouped forward gather.
    GroupIndexSelect,
    /// Grouped backward scatter-accumulate.
    GroupIndexAdd,
    /// Single-tensor gather and its backward.
    IndexSelect,
    /// Segment packing and unpacking.
    PackSegments,
}

/// Backend selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum ComputeBackend {
    /// Every operation on the accelerator.
    GpuOnly,

    /// Every operation on the host reference backend.
    ///
    /// Used for debugging, validation and machines without a GPU.
    CpuOnly,

    /// Small problems on the host, large ones on the accelerator.
    ///
    /// A launch plus argument upload costs more than a host loop for a few
    /// thousand elements.
    Adaptive {
        /// Element count at and above which the accelerator is used.
        min_gpu_elements: usize,
    },
}

impl Default for ComputeBackend {
    fn default() -> Self {
        ComputeBackend::Adaptive {
            min_gpu_elements: 1 << 14,
        }
    }
}

impl ComputeBackend {
    pub fn gpu_only() -> Self {
        ComputeBackend::GpuOnly
    }

    pub fn cpu_only() -> Self {
        ComputeBackend::CpuOnly
    }

    pub fn adaptive(min_gpu_elements: usize) -> Self {
        ComputeBackend::Adaptive { min_gpu_elements }
    }

    /// Determines if an operation should run on the host.
    ///
    /// `size` is the number of elements moved by the operation; without it an
    /// adaptive backend picks the accelerator.
    pub fn use_cpu(&self, op: OpType, size: Option<usize>) -> bool {
        match self {
            ComputeBackend::GpuOnly => false,
            ComputeBackend::CpuOnly => true,
            ComputeBackend::Adaptive { min_gpu_elements } => {
                // Scatter-add gets twice the host budget
                let threshold = match op {
                    OpType::GroupIndexAdd => min_gpu_elements.saturating_mul(2),
                    _ => *min_gpu_elements,
                };
                size.is_some_and(|n| n < threshold)
            }
        }
    }

    pub fn use_gpu(&self, op: OpType, size: Option<usize>) -> bool {
        !self.use_cpu(op, size)
    }

    /// Run `gpu_fn` or `cpu_fn` depending on the routing decision.
    pub fn run_routed<T, F, G>(&self, op: OpType, size: Option<usize>, gpu_fn: F, cpu_fn: G) -> T
    where
        F: FnOnce() -> T,
        G: FnOnce() -> T,
    {
        if self.use_cpu(op, size) {
            log::trace!("routing {:?} ({:?} elements) to host", op, size);
            cpu_fn()
        } else {
            log::trace!("routing {:?} ({:?} elements) to accelerator", op, size);
            gpu_fn()
        }
    }

    /// Try the accelerator, falling back to the host on error.
    ///
    /// Returns the result and whether the fallback ran.
    pub fn try_gpu_with_fallback<T, E, F, G>(&self, gpu_fn: F, cpu_fn: G, op: OpType) -> (T, bool)
    where
        F: FnOnce() -> Result<T, E>,
        G: FnOnce() -> T,
        E: fmt::Display,
    {
        match gpu_fn() {
            Ok(result) => (result, false),
            Err(e) => {
                log::warn!("accelerator {:?} failed, falling back to host: {}", op, e);
                (cpu_fn(), true)
            }
        }
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeBackend::GpuOnly => write!(f, "gpu"),
            ComputeBackend::CpuOnly => write!(f, "cpu"),
            ComputeBackend::Adaptive { min_gpu_elements } => {
                write!(f, "adaptive:{}", min_gpu_elements)
            }
        }
    }
}

impl FromStr for ComputeBackend {
    type Err = String;

    /// Parses `gpu`, `cpu`, `adaptive` or `adaptive:<min_gpu_elements>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" => Ok(ComputeBackend::GpuOnly),
            "cpu" => Ok(ComputeBackend::CpuOnly),
            "adaptive" => Ok(ComputeBackend::default()),
            other => match other.strip_prefix("adaptive:") {
                Some(n) => n
                    .parse()
                    .map(ComputeBackend::adaptive)
                    .map_err(|e| format!("invalid adaptive threshold {n:?}: {e}")),
                None => Err(format!(
                    "unknown backend {s:?}, expected gpu, cpu or adaptive[:N]"
                )),
            },
        }
    }
}
