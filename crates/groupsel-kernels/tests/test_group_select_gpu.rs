//! Fused CubeCL dispatch against the per-item reference on a GPU device.

#[cfg(feature = "gpu")]
mod tests {
    use burn::tensor::{Distribution, Int, Tensor};
    use groupsel_core::backend::{init_gpu_device, WgpuBackend};
    use groupsel_core::config::GroupSelectConfig;
    use groupsel_kernels::{group_index_select_forward, pack_segments, reference};

    type B = WgpuBackend;

    fn values<const D: usize>(t: &Tensor<B, D>) -> Vec<f32> {
        t.clone().into_data().to_vec().unwrap()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-4, "element {i}: {a} vs {e}");
        }
    }

    #[test]
    fn test_var_cols_forward_backward() {
        let device = init_gpu_device();
        let shapes = [[8, 3], [5, 300], [7, 64]];
        let inputs: Vec<Tensor<B, 2>> = shapes
            .iter()
            .map(|&s| Tensor::random(s, Distribution::Normal(0.0, 1.0), &device))
            .collect();
        let indices: Vec<Tensor<B, 1, Int>> = vec![
            Tensor::from_ints([7, 0, 0, 3], &device),
            Tensor::from_ints([4, 4, 1, 2], &device),
            Tensor::from_ints([0, 6, 6, 6], &device),
        ];
        let grads: Vec<Tensor<B, 2>> = shapes
            .iter()
            .map(|&[_, cols]| Tensor::random([4, cols], Distribution::Normal(0.0, 1.0), &device))
            .collect();

        let expected = reference::group_index_select(&inputs, &indices);
        let expected_grads = reference::group_index_add(&shapes, &indices, &grads);

        let config = GroupSelectConfig::builder().cols_per_warp(32).build().unwrap();
        let (outputs, state) = group_index_select_forward(inputs, indices, &config).unwrap();
        assert!(state.use_var_cols());
        for (out, exp) in outputs.iter().zip(&expected) {
            assert_eq!(values(out), values(exp));
        }

        let input_grads = state.backward(grads).unwrap().into_input_grads();
        for (grad, exp) in input_grads.iter().zip(&expected_grads) {
            assert_close(&values(grad), &values(exp));
        }
    }

    #[test]
    fn test_uniform_width_add_with_duplicates() {
        let device = init_gpu_device();
        let shapes = [[4, 5], [4, 5]];
        let inputs: Vec<Tensor<B, 2>> = shapes
            .iter()
            .map(|&s| Tensor::random(s, Distribution::Normal(0.0, 1.0), &device))
            .collect();
        let indices: Vec<Tensor<B, 1, Int>> = vec![
            Tensor::from_ints([2, 2, 0], &device),
            Tensor::from_ints([3, 1, 3], &device),
        ];
        let grads: Vec<Tensor<B, 2>> = (0..2)
            .map(|_| Tensor::random([3, 5], Distribution::Normal(0.0, 1.0), &device))
            .collect();

        let expected = reference::group_index_select(&inputs, &indices);
        let expected_grads = reference::group_index_add(&shapes, &indices, &grads);

        let config = GroupSelectConfig::builder().cols_per_warp(2).build().unwrap();
        let (outputs, state) = group_index_select_forward(inputs, indices, &config).unwrap();
        assert!(!state.use_var_cols());
        for (out, exp) in outputs.iter().zip(&expected) {
            assert_eq!(values(out), values(exp));
        }

        let input_grads = state.backward(grads).unwrap().into_input_grads();
        for (grad, exp) in input_grads.iter().zip(&expected_grads) {
            assert_close(&values(grad), &values(exp));
        }
    }

    #[test]
    fn test_pack_segments_on_device() {
        let device = init_gpu_device();
        let input = Tensor::<B, 1, Int>::arange(0..12, &device)
            .float()
            .reshape([6, 2]);
        let lengths = Tensor::<B, 1, Int>::from_ints([1, 4, 1], &device);

        let (packed, state) = pack_segments::<B, 2, 3>(input, lengths, Some(3)).unwrap();
        assert_eq!(
            values(&packed),
            vec![
                0.0, 1.0, 0.0, 0.0, 0.0, 0.0, //
                2.0, 3.0, 4.0, 5.0, 6.0, 7.0, //
                10.0, 11.0, 0.0, 0.0, 0.0, 0.0,
            ]
        );

        let grad_input = state.backward(Tensor::<B, 3>::ones([3, 3, 2], &device)).unwrap();
        assert_eq!(
            values(&grad_input),
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]
        );
    }
}
