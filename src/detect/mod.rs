//! Neural object detection: preprocessing, inference backends, decoding and
//! non-max suppression.

mod backend;
mod backends;
mod decode;
mod engine;
mod nms;
mod result;

pub use backend::{InferenceBackend, TensorOutput};
pub use backends::StubBackend;
pub use decode::{AxisOrder, TensorLayout};
pub use engine::{
    Detector, DetectorConfig, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE,
    DEFAULT_IOU_THRESHOLD,
};
pub use nms::{iou, non_max_suppression};
pub use result::{Detection, Rect};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
