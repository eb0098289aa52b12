//! Object detection seam and deduplication of new detections.
//!
//! The pipeline talks to any model through [`ObjectDetector`]; the
//! [`DetectorAdapter`] then decides which detections describe objects that no
//! tracked candidate covers yet.

mod adapter;
mod builder;
mod detector;

pub use adapter::DetectorAdapter;
pub use builder::DetectionBuilder;
pub use detector::{ClassFilter, Detection, ObjectDetector};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};
