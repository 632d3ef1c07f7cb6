//! Stub backend for model-less builds and tests.

use anyhow::Result;

use crate::detect::backend::{InferenceBackend, TensorOutput};

/// Produces an empty candidate tensor; the pipeline runs end to end without a
/// model file. Class count is configurable so the layout matches whatever the
/// deployment's class table declares.
pub struct StubBackend {
    class_count: usize,
}

impl StubBackend {
    pub fn new(class_count: usize) -> Self {
        Self { class_count }
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, _input: &[f32], _input_size: u32) -> Result<TensorOutput> {
        // Feature-major [1, 4 + nc, 0]: zero candidates.
        Ok(TensorOutput::new(Vec::new(), [1, 4 + self.class_count, 0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_yields_zero_candidates() {
        let mut backend = StubBackend::new(2);
        let out = backend.infer(&[], 640).unwrap();
        assert_eq!(out.dims, [1, 6, 0]);
        assert!(out.data.is_empty());
    }
}
