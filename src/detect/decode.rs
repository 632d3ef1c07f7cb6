//! Raw tensor decoding.
//!
//! Detector exports disagree on two points: whether the output is laid out
//! `[1, features, candidates]` or `[1, candidates, features]`, and whether an
//! explicit objectness scalar sits between the box parameters and the class
//! scores. Both are resolved once per inference call from the tensor
//! dimensions into a `TensorLayout`, and the decode loop then uses a single
//! fixed index computation instead of scattered conditionals.

use crate::detect::backend::TensorOutput;
use crate::detect::result::{Detection, Rect};

/// Which axis of the output tensor carries per-candidate features.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisOrder {
    /// `[1, features, candidates]`
    FeatureMajor,
    /// `[1, candidates, features]`
    IndexMajor,
}

/// Layout of one raw output tensor, classified from its dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TensorLayout {
    pub order: AxisOrder,
    /// Whether feature 4 is an explicit objectness scalar.
    pub objectness: bool,
    /// Features per candidate (4 box params [+ objectness] + class scores).
    pub features: usize,
    pub candidates: usize,
    /// Class scores carried by the tensor (may exceed the deployment table).
    pub class_count: usize,
}

/// Match a dimension against the known feature counts for a `class_count`
/// deployment. Full 80-class exports (84/85 features) are recognized even
/// when the local class table is shorter. Returns the objectness flag.
fn known_feature_count(dim: usize, class_count: usize) -> Option<bool> {
    if dim == 4 + class_count {
        Some(false)
    } else if class_count > 0 && dim == 5 + class_count {
        Some(true)
    } else if dim == 84 {
        Some(false)
    } else if dim == 85 {
        Some(true)
    } else {
        None
    }
}

impl TensorLayout {
    /// Classify an output shape. `class_count` is the deployment class-table
    /// length. Feature-major wins when both axes would match.
    pub fn classify(dims: [usize; 3], class_count: usize) -> Option<TensorLayout> {
        if dims[0] != 1 {
            return None;
        }
        if let Some(objectness) = known_feature_count(dims[1], class_count) {
            let features = dims[1];
            return Some(TensorLayout {
                order: AxisOrder::FeatureMajor,
                objectness,
                features,
                candidates: dims[2],
                class_count: features - 4 - usize::from(objectness),
            });
        }
        if let Some(objectness) = known_feature_count(dims[2], class_count) {
            let features = dims[2];
            return Some(TensorLayout {
                order: AxisOrder::IndexMajor,
                objectness,
                features,
                candidates: dims[1],
                class_count: features - 4 - usize::from(objectness),
            });
        }
        None
    }

    #[inline]
    fn at(&self, data: &[f32], feature: usize, candidate: usize) -> f32 {
        let idx = match self.order {
            AxisOrder::FeatureMajor => feature * self.candidates + candidate,
            AxisOrder::IndexMajor => candidate * self.features + feature,
        };
        data[idx]
    }
}

/// Decode raw candidates into frame-space detections, pre-NMS.
///
/// Boxes arrive as center/size in model input space; they are converted to
/// corners, filtered on confidence and on membership in the class table, and
/// rescaled by independent X/Y factors back to the original frame.
pub fn decode_candidates(
    output: &TensorOutput,
    layout: &TensorLayout,
    class_names: &[String],
    confidence_threshold: f32,
    scale_x: f32,
    scale_y: f32,
) -> Vec<Detection> {
    let data = &output.data;
    let class_start = if layout.objectness { 5 } else { 4 };
    let mut detections = Vec::new();

    for i in 0..layout.candidates {
        let cx = layout.at(data, 0, i);
        let cy = layout.at(data, 1, i);
        let w = layout.at(data, 2, i);
        let h = layout.at(data, 3, i);
        let objectness = if layout.objectness {
            layout.at(data, 4, i)
        } else {
            1.0
        };

        let mut max_score = 0.0f32;
        let mut class_id = 0usize;
        for c in 0..layout.class_count {
            let score = layout.at(data, class_start + c, i);
            if score > max_score {
                max_score = score;
                class_id = c;
            }
        }

        let confidence = if layout.objectness {
            objectness * max_score
        } else {
            max_score
        };
        if confidence < confidence_threshold {
            continue;
        }
        // Classes outside the deployment table are not reportable.
        if class_id >= class_names.len() {
            continue;
        }

        let rect = Rect::new(
            (cx - w / 2.0) * scale_x,
            (cy - h / 2.0) * scale_y,
            (cx + w / 2.0) * scale_x,
            (cy + h / 2.0) * scale_y,
        );

        detections.push(Detection {
            rect,
            confidence,
            class_id,
            class_name: class_names[class_id].clone(),
        });
    }

    detections
}
