//! Fused group dispatch against per-item reference loops on the host backend.

use burn::tensor::{Int, Tensor, TensorData};
use groupsel_core::backend::{init_cpu_device, CpuBackend};
use groupsel_core::config::GroupSelectConfig;
use groupsel_kernels::{group_index_select_forward, index_select_dim0, reference};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type B = CpuBackend;

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Tensor<B, 2> {
    let data: Vec<f32> = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Tensor::<B, 1>::from_data(TensorData::new(data, [rows * cols]), &init_cpu_device())
        .reshape([rows, cols])
}

fn random_indices(rng: &mut StdRng, count: usize, high: usize) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = (0..count).map(|_| rng.gen_range(0..high as i64)).collect();
    Tensor::from_data(TensorData::new(data, [count]), &init_cpu_device())
}

fn values<const D: usize>(t: &Tensor<B, D>) -> Vec<f32> {
    t.clone().into_data().to_vec().unwrap()
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-5, "element {i}: {a} vs {e}");
    }
}

#[test]
fn test_random_groups_match_reference() {
    let mut rng = StdRng::seed_from_u64(42);

    for cols_per_warp in [1, 7, 256] {
        let config = GroupSelectConfig::builder()
            .cols_per_warp(cols_per_warp)
            .build()
            .unwrap();
        let num_output_rows = rng.gen_range(1..12);

        let shapes: Vec<[usize; 2]> = (0..5)
            .map(|_| [rng.gen_range(1..9), rng.gen_range(1..40)])
            .collect();
        let inputs: Vec<Tensor<B, 2>> = shapes
            .iter()
            .map(|&[rows, cols]| random_matrix(&mut rng, rows, cols))
            .collect();
        let indices: Vec<Tensor<B, 1, Int>> = shapes
            .iter()
            .map(|&[rows, _]| random_indices(&mut rng, num_output_rows, rows))
            .collect();
        let grad_outputs: Vec<Tensor<B, 2>> = shapes
            .iter()
            .map(|&[_, cols]| random_matrix(&mut rng, num_output_rows, cols))
            .collect();

        let expected = reference::group_index_select(&inputs, &indices);
        let expected_grads = reference::group_index_add(&shapes, &indices, &grad_outputs);

        let (outputs, state) =
            group_index_select_forward(inputs, indices, &config).unwrap();
        for (out, exp) in outputs.iter().zip(&expected) {
            assert_eq!(out.dims(), exp.dims());
            assert_eq!(values(out), values(exp));
        }

        let grads = state.backward(grad_outputs).unwrap();
        assert_eq!(grads.len(), 2 * shapes.len() + 1);
        for (grad, exp) in grads.into_input_grads().iter().zip(&expected_grads) {
            assert_eq!(grad.dims(), exp.dims());
            assert_close(&values(grad), &values(exp));
        }
    }
}

#[test]
fn test_single_item_matches_index_select() {
    let mut rng = StdRng::seed_from_u64(7);
    let input = random_matrix(&mut rng, 6, 13);
    let idx = random_indices(&mut rng, 9, 6);

    let (grouped, group_state) = group_index_select_forward(
        vec![input.clone()],
        vec![idx.clone()],
        &GroupSelectConfig::default(),
    )
    .unwrap();
    let (single, single_state) =
        index_select_dim0(input, idx, 0, 0, false, &GroupSelectConfig::default()).unwrap();
    assert_eq!(values(&grouped[0]), values(&single));

    let grad = random_matrix(&mut rng, 9, 13);
    let group_grads = group_state.backward(vec![grad.clone()]).unwrap();
    let single_grad = single_state.backward(grad).unwrap();
    assert_close(
        &values(group_grads.input_grad(0).unwrap()),
        &values(&single_grad),
    );
}

#[test]
fn test_duplicate_indices_accumulate() {
    let device = init_cpu_device();
    let input = Tensor::<B, 2>::zeros([3, 4], &device);
    let idx = Tensor::<B, 1, Int>::from_ints([1, 1, 1, 2], &device);

    let (_outputs, state) =
        group_index_select_forward(vec![input], vec![idx], &GroupSelectConfig::default()).unwrap();
    let grads = state
        .backward(vec![Tensor::ones([4, 4], &device)])
        .unwrap();

    assert_eq!(
        values(grads.input_grad(0).unwrap()),
        vec![0.0, 0.0, 0.0, 0.0, 3.0, 3.0, 3.0, 3.0, 1.0, 1.0, 1.0, 1.0]
    );
}

#[test]
fn test_uniform_width_group() {
    let device = init_cpu_device();
    let a = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
    let b = Tensor::<B, 2>::from_floats([[5.0, 6.0], [7.0, 8.0], [9.0, 10.0]], &device);
    let idx_a = Tensor::<B, 1, Int>::from_ints([1, 0], &device);
    let idx_b = Tensor::<B, 1, Int>::from_ints([2, 2], &device);

    let (outputs, state) = group_index_select_forward(
        vec![a, b],
        vec![idx_a, idx_b],
        &GroupSelectConfig::default(),
    )
    .unwrap();
    assert!(!state.use_var_cols());
    assert_eq!(values(&outputs[0]), vec![3.0, 4.0, 1.0, 2.0]);
    assert_eq!(values(&outputs[1]), vec![9.0, 10.0, 9.0, 10.0]);
}

#[test]
fn test_uniform_width_add_with_duplicates() {
    let mut rng = StdRng::seed_from_u64(11);
    let device = init_cpu_device();
    let shapes = [[4, 5], [4, 5]];
    let inputs: Vec<Tensor<B, 2>> = shapes
        .iter()
        .map(|&[rows, cols]| random_matrix(&mut rng, rows, cols))
        .collect();
    let indices = vec![
        Tensor::<B, 1, Int>::from_ints([2, 2, 0], &device),
        Tensor::<B, 1, Int>::from_ints([3, 1, 3], &device),
    ];
    let grad_outputs: Vec<Tensor<B, 2>> = (0..2).map(|_| random_matrix(&mut rng, 3, 5)).collect();

    let expected = reference::group_index_select(&inputs, &indices);
    let expected_grads = reference::group_index_add(&shapes, &indices, &grad_outputs);

    // Five columns over two-wide warps leaves a partial last chunk per row
    let config = GroupSelectConfig::builder().cols_per_warp(2).build().unwrap();
    let (outputs, state) = group_index_select_forward(inputs, indices, &config).unwrap();
    assert!(!state.use_var_cols());
    for (out, exp) in outputs.iter().zip(&expected) {
        assert_eq!(values(out), values(exp));
    }

    let input_grads = state.backward(grad_outputs).unwrap().into_input_grads();
    for (grad, exp) in input_grads.iter().zip(&expected_grads) {
        assert_eq!(grad.dims(), exp.dims());
        assert_close(&values(grad), &values(exp));
    }
    // Row 1 of the first item and rows 0 and 2 of the second are never selected
    assert!(values(&input_grads[0])[5..10].iter().all(|&v| v == 0.0));
    assert!(values(&input_grads[1])[0..5].iter().all(|&v| v == 0.0));
}
