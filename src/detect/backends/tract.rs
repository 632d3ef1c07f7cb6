#![cfg(feature = "backend-tract")]

//! Tract-based ONNX inference backend.
//!
//! Loads a local model file and performs one forward pass per call. Model
//! loading failures are fatal at construction; the engine maps per-call
//! failures to an empty detection list.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{InferenceBackend, TensorOutput};

pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    ///
    /// A missing model file is reported with its path; the caller treats this
    /// as fatal and leaves detection disabled.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(anyhow!(
                "detection model not found: {}",
                model_path.display()
            ));
        }

        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, input: &[f32], input_size: u32) -> Result<TensorOutput> {
        if input_size != self.input_size {
            return Err(anyhow!(
                "input size {} does not match model input {}",
                input_size,
                self.input_size
            ));
        }
        let side = input_size as usize;
        let expected = 3 * side * side;
        if input.len() != expected {
            return Err(anyhow!(
                "expected {} input floats, received {}",
                expected,
                input.len()
            ));
        }

        let tensor = Tensor::from_shape(&[1, 3, side, side], input)
            .context("failed to shape input tensor")?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let shape = view.shape();
        let dims = match shape.len() {
            3 => [shape[0], shape[1], shape[2]],
            2 => [1, shape[0], shape[1]],
            n => return Err(anyhow!("unsupported output rank {}", n)),
        };
        let data = match view.as_slice() {
            Some(slice) => slice.to_vec(),
            None => view.iter().cloned().collect(),
        };

        Ok(TensorOutput::new(data, dims))
    }
}
