//! Detection engine.
//!
//! Converts a captured frame into a fixed-size normalized tensor, runs one
//! forward pass through the configured backend, and decodes the raw output
//! into confidence-filtered, NMS-reduced detections in frame coordinates.
//!
//! The engine owns a persistent planar input buffer that is overwritten on
//! every call; the pipeline guarantees a single inference at a time, so the
//! buffer is never read and written concurrently.

use anyhow::{anyhow, Result};

use crate::detect::backend::InferenceBackend;
use crate::detect::decode::{decode_candidates, TensorLayout};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::Detection;
use crate::frame::{Frame, BYTES_PER_PIXEL};

/// Model input side length (square input).
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Clone, Debug)]
pub struct DetectorConfig {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Deployment class table; class ids index into it.
    pub class_names: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            class_names: vec!["person".to_string(), "head".to_string()],
        }
    }
}

pub struct Detector {
    backend: Box<dyn InferenceBackend>,
    config: DetectorConfig,
    /// Persistent `3*S*S` channel-planar input buffer (R plane, G plane,
    /// B plane), overwritten per call.
    tensor: Vec<f32>,
}

impl Detector {
    pub fn new(backend: Box<dyn InferenceBackend>, config: DetectorConfig) -> Self {
        let side = config.input_size as usize;
        Self {
            backend,
            config,
            tensor: vec![0.0; 3 * side * side],
        }
    }

    /// Load the tract backend from a model file.
    #[cfg(feature = "backend-tract")]
    pub fn from_model_path<P: AsRef<std::path::Path>>(
        model_path: P,
        config: DetectorConfig,
    ) -> Result<Self> {
        let backend = crate::detect::backends::TractBackend::new(model_path, config.input_size)?;
        Ok(Self::new(Box::new(backend), config))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run detection on one frame.
    ///
    /// This is the failure boundary: any inference or postprocessing error is
    /// logged here and mapped to an empty list so the capture loop never
    /// stops on a bad frame.
    pub fn detect(&mut self, frame: &Frame) -> Vec<Detection> {
        match self.try_detect(frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::error!("detection failed: {:#}", err);
                Vec::new()
            }
        }
    }

    fn try_detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.preprocess(frame);

        let output = self.backend.infer(&self.tensor, self.config.input_size)?;
        let layout = TensorLayout::classify(output.dims, self.config.class_names.len())
            .ok_or_else(|| {
                anyhow!(
                    "unsupported detector output shape [{}, {}, {}]",
                    output.dims[0],
                    output.dims[1],
                    output.dims[2]
                )
            })?;

        let scale_x = frame.width() as f32 / self.config.input_size as f32;
        let scale_y = frame.height() as f32 / self.config.input_size as f32;
        let candidates = decode_candidates(
            &output,
            &layout,
            &self.config.class_names,
            self.config.confidence_threshold,
            scale_x,
            scale_y,
        );

        Ok(non_max_suppression(candidates, self.config.iou_threshold))
    }

    /// Stretch-resize the frame to `SxS` (aspect ratio not preserved),
    /// convert BGRA to RGB and normalize bytes to `[0, 1]`, writing into the
    /// persistent channel-planar buffer.
    fn preprocess(&mut self, frame: &Frame) {
        let side = self.config.input_size as usize;
        let src_w = frame.width() as usize;
        let src_h = frame.height() as usize;
        let data = frame.data();
        let plane = side * side;
        const INV_255: f32 = 1.0 / 255.0;

        if src_w == side && src_h == side {
            // Same-size fast path: pure channel shuffle.
            for y in 0..side {
                for x in 0..side {
                    let src = (y * side + x) * BYTES_PER_PIXEL;
                    let dst = y * side + x;
                    self.tensor[dst] = data[src + 2] as f32 * INV_255;
                    self.tensor[plane + dst] = data[src + 1] as f32 * INV_255;
                    self.tensor[2 * plane + dst] = data[src] as f32 * INV_255;
                }
            }
            return;
        }

        let x_ratio = src_w as f32 / side as f32;
        let y_ratio = src_h as f32 / side as f32;

        for y in 0..side {
            let sy = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
            let y0 = (sy as usize).min(src_h - 1);
            let y1 = (y0 + 1).min(src_h - 1);
            let fy = sy - y0 as f32;

            for x in 0..side {
                let sx = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
                let x0 = (sx as usize).min(src_w - 1);
                let x1 = (x0 + 1).min(src_w - 1);
                let fx = sx - x0 as f32;

                let i00 = (y0 * src_w + x0) * BYTES_PER_PIXEL;
                let i01 = (y0 * src_w + x1) * BYTES_PER_PIXEL;
                let i10 = (y1 * src_w + x0) * BYTES_PER_PIXEL;
                let i11 = (y1 * src_w + x1) * BYTES_PER_PIXEL;
                let dst = y * side + x;

                // BGRA source: channel 2 is red, 1 green, 0 blue.
                for (c, offset) in [2usize, 1, 0].into_iter().enumerate() {
                    let top = data[i00 + offset] as f32 * (1.0 - fx)
                        + data[i01 + offset] as f32 * fx;
                    let bottom = data[i10 + offset] as f32 * (1.0 - fx)
                        + data[i11 + offset] as f32 * fx;
                    self.tensor[c * plane + dst] =
                        (top * (1.0 - fy) + bottom * fy) * INV_255;
                }
            }
        }
    }
}
