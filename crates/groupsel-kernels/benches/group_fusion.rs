//! Benchmarks comparing the fused group dispatch vs per-item reference loops.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use burn::tensor::{Distribution, Int, Tensor};
use groupsel_core::backend::{init_cpu_device, CpuBackend};
use groupsel_core::config::GroupSelectConfig;
use groupsel_kernels::{group_index_select_forward, reference, GroupSelectBackend};

#[cfg(feature = "gpu")]
use groupsel_core::backend::{init_gpu_device, WgpuBackend};

const WIDTHS: [usize; 8] = [4, 16, 32, 64, 100, 128, 256, 512];
const TABLE_ROWS: usize = 1000;

fn make_group<B: GroupSelectBackend>(
    device: &B::Device,
    num_lookups: usize,
) -> (Vec<Tensor<B, 2>>, Vec<Tensor<B, 1, Int>>) {
    let tables = WIDTHS
        .iter()
        .map(|&cols| Tensor::random([TABLE_ROWS, cols], Distribution::Normal(0.0, 1.0), device))
        .collect();
    let indices = WIDTHS
        .iter()
        .map(|_| {
            Tensor::<B, 1>::random(
                [num_lookups],
                Distribution::Uniform(0.0, TABLE_ROWS as f64),
                device,
            )
            .int()
        })
        .collect();
    (tables, indices)
}

fn bench_backend<B: GroupSelectBackend>(c: &mut Criterion, name: &str, device: &B::Device) {
    let config = GroupSelectConfig::default();
    let mut group = c.benchmark_group(format!("group_index_select/{name}"));

    for num_lookups in [64, 512, 4096].iter() {
        let (tables, indices) = make_group::<B>(device, *num_lookups);

        group.bench_with_input(
            BenchmarkId::new("reference", num_lookups),
            num_lookups,
            |b, _| b.iter(|| reference::group_index_select(black_box(&tables), black_box(&indices))),
        );

        group.bench_with_input(BenchmarkId::new("fused", num_lookups), num_lookups, |b, _| {
            b.iter(|| {
                group_index_select_forward(
                    black_box(tables.clone()),
                    black_box(indices.clone()),
                    &config,
                )
            })
        });

        group.bench_with_input(
            BenchmarkId::new("fused_backward", num_lookups),
            num_lookups,
            |b, _| {
                b.iter(|| {
                    let (outputs, state) =
                        group_index_select_forward(tables.clone(), indices.clone(), &config)
                            .expect("forward");
                    let grads = outputs.iter().map(|o| o.ones_like()).collect();
                    black_box(state.backward(grads).expect("backward"))
                })
            },
        );
    }

    group.finish();
}

fn benchmark_host(c: &mut Criterion) {
    bench_backend::<CpuBackend>(c, "ndarray", &init_cpu_device());
}

#[cfg(feature = "gpu")]
fn benchmark_gpu(c: &mut Criterion) {
    bench_backend::<WgpuBackend>(c, "wgpu", &init_gpu_device());
}

#[cfg(not(feature = "gpu"))]
criterion_group!(benches, benchmark_host);

#[cfg(feature = "gpu")]
criterion_group!(benches, benchmark_host, benchmark_gpu);

criterion_main!(benches);
