//! Backend aliases and device setup.

pub type CpuBackend = burn::backend::NdArray;

pub fn init_cpu_device() -> burn::backend::ndarray::NdArrayDevice {
    burn::backend::ndarray::NdArrayDevice::Cpu
}

#[cfg(feature = "gpu")]
pub use gpu::*;

#[cfg(feature = "gpu")]
mod gpu {
    use burn::backend::wgpu::WgpuDevice;

    /// `CubeBackend<WgpuRuntime, f32, i32, u32>`
    pub type WgpuBackend = burn::backend::Wgpu;

    pub fn init_gpu_device() -> WgpuDevice {
        // Metal is picked automatically on macOS when available
        WgpuDevice::default()
    }

    pub fn ensure_metal_backend() {
        std::env::set_var("BURN_WGPU_BACKEND", "metal");
    }
}
