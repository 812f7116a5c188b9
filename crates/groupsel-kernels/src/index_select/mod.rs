//! Single-tensor row gather along dimension 0.
//!
//! The forward pass sorts the indices for locality unless told not to; the
//! backward pass always accumulates in sorted order, optionally restricted to
//! a consecutive range of input rows known to contain every index.

mod backward;
mod forward;

pub use backward::IndexSelectState;
pub use forward::{index_select, index_select_dim0};

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Int, Tensor};
    use groupsel_core::backend::{init_cpu_device, CpuBackend};
    use groupsel_core::config::GroupSelectConfig;
    use groupsel_core::error::GroupSelectError;

    type B = CpuBackend;

    fn config() -> GroupSelectConfig {
        GroupSelectConfig::default()
    }

    fn values<const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    fn input() -> Tensor<B, 2> {
        Tensor::<B, 1, Int>::arange(0..12, &init_cpu_device())
            .float()
            .reshape([4, 3])
    }

    #[test]
    fn test_sorted_and_unsorted_agree() {
        let device = init_cpu_device();
        let idx = Tensor::<B, 1, Int>::from_ints([3, 0, 3, 1], &device);

        let (sorted, _) = index_select_dim0(input(), idx.clone(), 0, 0, false, &config()).unwrap();
        let (unsorted, _) = index_select_dim0(input(), idx.clone(), 0, 0, true, &config()).unwrap();
        let expected = input().select(0, idx);

        assert_eq!(sorted.dims(), [4, 3]);
        assert_eq!(values(sorted), values(expected.clone()));
        assert_eq!(values(unsorted), values(expected));
    }

    #[test]
    fn test_backward_accumulates_duplicates() {
        let device = init_cpu_device();
        let idx = Tensor::<B, 1, Int>::from_ints([2, 0, 2], &device);

        for skip_sort in [false, true] {
            let (_, state) =
                index_select_dim0(input(), idx.clone(), 0, 0, skip_sort, &config()).unwrap();
            let grad = state.backward(Tensor::ones([3, 3], &device)).unwrap();
            assert_eq!(
                values(grad),
                vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0]
            );
        }
    }

    #[test]
    fn test_consecutive_range_backward() {
        let device = init_cpu_device();
        let idx = Tensor::<B, 1, Int>::from_ints([2, 1, 2], &device);

        let (_, state) = index_select_dim0(input(), idx, 1, 2, false, &config()).unwrap();
        let grad_out = Tensor::<B, 1, Int>::arange(0..9, &device)
            .float()
            .reshape([3, 3]);
        let grad = state.backward(grad_out).unwrap();

        // Row 1 gets grad row 1, row 2 gets grad rows 0 and 2
        assert_eq!(
            values(grad),
            vec![0.0, 0.0, 0.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_range_past_input_rejected() {
        let device = init_cpu_device();
        let idx = Tensor::<B, 1, Int>::from_ints([0], &device);
        let err = index_select_dim0(input(), idx, 3, 2, false, &config()).unwrap_err();
        assert!(matches!(err, GroupSelectError::IndexOutOfRange { .. }));
    }

    #[test]
    fn test_index_validation_follows_config() {
        let device = init_cpu_device();
        let idx = Tensor::<B, 1, Int>::from_ints([1, 4], &device);
        let checked = GroupSelectConfig::builder()
            .validate_indices(true)
            .build()
            .unwrap();

        let err = index_select_dim0(input(), idx.clone(), 0, 0, true, &checked).unwrap_err();
        assert!(matches!(
            err,
            GroupSelectError::IndexOutOfRange {
                index: 4,
                high: 4,
                ..
            }
        ));

        // Inside the range hint only
        let idx = Tensor::<B, 1, Int>::from_ints([2, 0], &device);
        let err = index_select_dim0(input(), idx, 1, 2, false, &checked).unwrap_err();
        assert!(matches!(
            err,
            GroupSelectError::IndexOutOfRange {
                index: 0,
                low: 1,
                high: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_gradient_shape_checked() {
        let device = init_cpu_device();
        let idx = Tensor::<B, 1, Int>::from_ints([0, 1], &device);
        let (_, state) = index_select_dim0(input(), idx, 0, 0, false, &config()).unwrap();
        let err = state.backward(Tensor::ones([3, 3], &device)).unwrap_err();
        assert!(matches!(err, GroupSelectError::GradientShapeMismatch { .. }));
    }

    #[test]
    fn test_forward_only() {
        let device = init_cpu_device();
        let idx = Tensor::<B, 1, Int>::from_ints([1], &device);
        let out = index_select(input(), idx).unwrap();
        assert_eq!(values(out), vec![3.0, 4.0, 5.0]);
    }
}
