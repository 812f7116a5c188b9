//! # Group Select Demo
//!
//! Gathers rows from a group of embedding tables of different widths in one
//! dispatch, runs the backward pass, and packs a ragged batch:
//! - Configuration from CLI flags, environment or a TOML file
//! - Routing between the host backend and the GPU (`gpu` feature)
//! - Gradient slots of the grouped backward pass
//!
//! ```text
//! RUST_LOG=debug cargo run --example group_select_demo -- --cols-per-warp 64
//! ```

use anyhow::Result;
use burn::tensor::{ElementConversion, Int, Tensor};
use groupsel_core::backend::{init_cpu_device, CpuBackend};
use groupsel_core::compute::OpType;
use groupsel_core::config::GroupSelectConfig;
use groupsel_kernels::{group_index_select_forward, pack_segments, GroupSelectBackend};
use std::time::Instant;

/// Table widths of the group; rows are shared.
const WIDTHS: [usize; 4] = [16, 3, 300, 64];
const TABLE_ROWS: usize = 50;
const LOOKUPS: [i64; 6] = [3, 17, 3, 49, 0, 17];

fn run_group<B: GroupSelectBackend>(
    device: &B::Device,
    config: &GroupSelectConfig,
) -> Result<Vec<f32>> {
    let tables: Vec<Tensor<B, 2>> = WIDTHS
        .iter()
        .map(|&cols| {
            Tensor::<B, 1, Int>::arange(0..(TABLE_ROWS * cols) as i64, device)
                .float()
                .reshape([TABLE_ROWS, cols])
        })
        .collect();
    let indices: Vec<Tensor<B, 1, Int>> = WIDTHS
        .iter()
        .map(|_| Tensor::from_ints(LOOKUPS, device))
        .collect();

    let start = Instant::now();
    let (outputs, state) = group_index_select_forward(tables, indices, config)?;
    println!(
        "  forward: {} outputs, var_cols={}, {:.2?}",
        outputs.len(),
        state.use_var_cols(),
        start.elapsed()
    );
    for (i, out) in outputs.iter().enumerate() {
        println!("    output[{i}] shape {:?}", out.dims());
    }

    let grad_outputs: Vec<Tensor<B, 2>> = outputs.iter().map(|o| o.ones_like()).collect();
    let start = Instant::now();
    let grads = state.backward(grad_outputs)?;
    println!(
        "  backward: {} gradient slots, {:.2?}",
        grads.len(),
        start.elapsed()
    );

    // Row 3 and 17 were looked up twice
    let grad_first = grads
        .input_grad(0)
        .ok_or_else(|| anyhow::anyhow!("missing gradient for item 0"))?;
    let row_sums: Vec<f32> = grad_first
        .clone()
        .sum_dim(1)
        .into_data()
        .to_vec()
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
    Ok(row_sums)
}

fn run_packing<B: GroupSelectBackend>(device: &B::Device) -> Result<()> {
    let tokens = Tensor::<B, 1, Int>::arange(0..20, device)
        .float()
        .reshape([10, 2]);
    let lengths = Tensor::<B, 1, Int>::from_ints([3, 6, 1], device);

    let (packed, state) = pack_segments::<B, 2, 3>(tokens, lengths, Some(4))?;
    println!("  packed shape {:?}", packed.dims());

    let grad = state.backward(packed.ones_like())?;
    let kept: f32 = grad.sum().into_scalar().elem();
    println!("  rows receiving gradient: {}", kept / 2.0);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Group Select Demo ===\n");

    let config = GroupSelectConfig::from_args_relaxed();
    config.log_summary();

    let total_elements: usize = WIDTHS.iter().map(|w| w * TABLE_ROWS).sum();
    let backend = config.backend();
    println!(
        "Routing {} elements with {} backend\n",
        total_elements, backend
    );

    println!("Grouped lookup:");
    let row_sums = backend.run_routed(
        OpType::GroupIndexSelect,
        Some(total_elements),
        || run_group_on_gpu(&config),
        || run_group::<CpuBackend>(&init_cpu_device(), &config),
    )?;
    for (row, sum) in row_sums.iter().enumerate() {
        if *sum > 0.0 {
            println!("    row {row}: grad sum {sum}");
        }
    }
    println!();

    println!("Segment packing:");
    run_packing::<CpuBackend>(&init_cpu_device())?;

    println!("\nDone.");
    Ok(())
}

#[cfg(feature = "gpu")]
fn run_group_on_gpu(config: &GroupSelectConfig) -> Result<Vec<f32>> {
    use groupsel_core::backend::{init_gpu_device, WgpuBackend};
    run_group::<WgpuBackend>(&init_gpu_device(), config)
}

#[cfg(not(feature = "gpu"))]
fn run_group_on_gpu(config: &GroupSelectConfig) -> Result<Vec<f32>> {
    log::warn!("built without the gpu feature, running on the host");
    run_group::<CpuBackend>(&init_cpu_device(), config)
}
