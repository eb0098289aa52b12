//! Burn inference backend for object detection.
//!
//! [`BurnDetector`] runs any [`BurnModel`] on the frame, keeps the classes the
//! pipeline asked for and hands back normalized, upright detections.
//!
//! # Example
//!
//! ```ignore
//! use seektrack_rs::detection::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//!
//!     fn class_labels(&self) -> &[String] {
//!         &self.labels
//!     }
//! }
//!
//! let detector = BurnDetector::new(MyYoloModel::load("model.bin"), Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use thiserror::Error;

use super::{ClassFilter, Detection, DetectionBuilder, ObjectDetector};
use crate::frame::Frame;
use crate::geometry::{Orientation, Rect};

/// Error type for Burn detection failures.
#[derive(Error, Debug, Clone)]
pub enum BurnDetectorError {
    #[error("frame is {got:?}, model expects {expected:?} (width, height)")]
    InvalidInputDimensions { expected: (u32, u32), got: (u32, u32) },

    #[error("preprocessing error: {0}")]
    Preprocessing(String),
}

/// Raw detection output from the model, in model-input pixels.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Bounding box: [x1, y1, x2, y2] or [cx, cy, w, h] depending on model
    pub bbox: [f32; 4],
    pub score: f32,
    /// Index into [`BurnModel::class_labels`].
    pub class_id: usize,
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on a `[1, 3, height, width]` tensor in `[0, 1]`.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Label for every class id the model emits.
    fn class_labels(&self) -> &[String];

    /// Expected input size (width, height).
    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true
    }
}

/// Burn-based object detector implementing [`ObjectDetector`].
pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
    conf_threshold: f32,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            conf_threshold: 0.25,
        }
    }

    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    /// Convert an RGB24 frame to a `[1, C, H, W]` tensor.
    ///
    /// The frame must already match the model's input size.
    fn preprocess(&self, frame: &Frame) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (width, height) = self.model.input_size();
        if (frame.width, frame.height) != (width, height) {
            return Err(BurnDetectorError::InvalidInputDimensions {
                expected: (width, height),
                got: (frame.width, frame.height),
            });
        }
        let pixels = (width * height) as usize;
        if frame.data.len() != pixels * Frame::CHANNELS {
            return Err(BurnDetectorError::Preprocessing(format!(
                "buffer holds {} bytes for {} pixels",
                frame.data.len(),
                pixels
            )));
        }

        // Interleaved HWC bytes to planar CHW floats.
        let mut data = vec![0f32; pixels * Frame::CHANNELS];
        for (p, rgb) in frame.data.chunks_exact(Frame::CHANNELS).enumerate() {
            for (c, &v) in rgb.iter().enumerate() {
                data[c * pixels + p] = v as f32 / 255.0;
            }
        }

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            Frame::CHANNELS,
            height as usize,
            width as usize,
        ]))
    }

    fn postprocess(
        &self,
        raw: Vec<RawDetection>,
        filter: &ClassFilter,
        orientation: Orientation,
    ) -> Vec<Detection> {
        let (width, height) = self.model.input_size();
        let labels = self.model.class_labels();
        raw.into_iter()
            .filter(|d| d.score >= self.conf_threshold)
            .filter_map(|d| {
                let label = labels.get(d.class_id)?;
                if !filter.allows(label) {
                    return None;
                }
                let builder = DetectionBuilder::new(label.clone()).confidence(d.score);
                let builder = if self.model.bbox_is_xywh() {
                    builder.xywh(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3])
                } else {
                    builder.tlbr(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3])
                };
                let mut det = builder.normalize(width as f32, height as f32).build();
                det.bbox = buffer_to_upright(orientation, &det.bbox);
                Some(det)
            })
            .collect()
    }
}

/// Inverse of [`Orientation::rect_to_buffer`].
fn buffer_to_upright(orientation: Orientation, rect: &Rect) -> Rect {
    let inverse = match orientation {
        Orientation::Left => Orientation::Right,
        Orientation::Right => Orientation::Left,
        other => other,
    };
    inverse.rect_to_buffer(rect)
}

impl<B: Backend, M: BurnModel<B>> ObjectDetector for BurnDetector<B, M>
where
    B::Device: Send,
{
    type Error = BurnDetectorError;

    fn detect(
        &mut self,
        frame: &Frame,
        filter: &ClassFilter,
        orientation: Orientation,
    ) -> Result<Vec<Detection>, Self::Error> {
        let tensor = self.preprocess(frame)?;
        let raw = self.model.forward(tensor);
        Ok(self.postprocess(raw, filter, orientation))
    }
}
