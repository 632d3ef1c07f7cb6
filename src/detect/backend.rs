//! Inference backend trait.

use anyhow::Result;

/// Raw tensor produced by one forward pass.
///
/// `dims` is the full output shape; the engine classifies which axis holds
/// per-candidate features before decoding, so backends hand the tensor over
/// untouched.
#[derive(Clone, Debug)]
pub struct TensorOutput {
    pub data: Vec<f32>,
    pub dims: [usize; 3],
}

impl TensorOutput {
    pub fn new(data: Vec<f32>, dims: [usize; 3]) -> Self {
        debug_assert_eq!(data.len(), dims[0] * dims[1] * dims[2]);
        Self { data, dims }
    }
}

/// A model runtime the detection engine drives.
///
/// Implementations run exactly one forward pass per call. The engine enforces
/// the single-inference-at-a-time invariant; backends never see concurrent
/// calls and may keep per-session state in `&mut self`.
pub trait InferenceBackend: Send {
    /// Backend identifier for logs and the device label.
    fn name(&self) -> &'static str;

    /// Run one forward pass over a planar `1x3xSxS` input.
    fn infer(&mut self, input: &[f32], input_size: u32) -> Result<TensorOutput>;
}
