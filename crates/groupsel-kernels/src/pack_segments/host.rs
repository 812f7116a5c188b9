//! Host segment packing on the reference backend.

use burn::tensor::backend::Backend;
use burn::tensor::ops::FloatTensor;
use burn::tensor::{Tensor, TensorData, TensorPrimitive};
use groupsel_core::segments::SegmentLayout;

/// Same row map walk as the device kernel.
fn gather_rows<B: Backend>(src: FloatTensor<B>, rows: &[u32], num_cols: usize) -> FloatTensor<B> {
    let src: Tensor<B, 1> = Tensor::from_primitive(TensorPrimitive::Float(src));
    let device = src.device();
    let src: Vec<f32> = src.into_data().iter::<f32>().collect();

    let mut out = vec![0.0f32; rows.len() * num_cols];
    for (dst_row, &row) in rows.iter().enumerate() {
        if row == 0 {
            continue;
        }
        let from = (row as usize - 1) * num_cols;
        let to = dst_row * num_cols;
        out[to..to + num_cols].copy_from_slice(&src[from..from + num_cols]);
    }

    let len = out.len();
    Tensor::<B, 1>::from_data(TensorData::new(out, [len]), &device)
        .into_primitive()
        .tensor()
}

pub(crate) fn pack<B: Backend>(input: FloatTensor<B>, segments: &SegmentLayout) -> FloatTensor<B> {
    gather_rows::<B>(input, &segments.pack_rows(), segments.num_cols())
}

pub(crate) fn unpack<B: Backend>(packed: FloatTensor<B>, segments: &SegmentLayout) -> FloatTensor<B> {
    gather_rows::<B>(packed, &segments.unpack_rows(), segments.num_cols())
}
