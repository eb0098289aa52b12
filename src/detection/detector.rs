//! Trait for object detection inference backends.

use std::fmt;

use ndarray::Array1;

use crate::frame::Frame;
use crate::geometry::{Orientation, Rect};

/// One object instance reported by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Class label, e.g. `"car"`.
    pub label: String,
    /// Normalized box in upright image space.
    pub bbox: Rect,
    /// Detection confidence score
    pub confidence: f32,
    /// Optional appearance embedding for re-identification.
    pub embedding: Option<Array1<f32>>,
}

impl Detection {
    pub fn new(label: impl Into<String>, bbox: Rect, confidence: f32) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence,
            embedding: None,
        }
    }
}

/// Set of class labels a detector should report. Empty means "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilter {
    labels: Vec<String>,
}

impl ClassFilter {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn allows(&self, label: &str) -> bool {
        self.labels.is_empty() || self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the pipeline.
///
/// # Example
///
/// ```ignore
/// use seektrack_rs::{ObjectDetector, Detection, ClassFilter, Frame, Orientation};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl ObjectDetector for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(
///         &mut self,
///         frame: &Frame,
///         filter: &ClassFilter,
///         orientation: Orientation,
///     ) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return detections
///         Ok(vec![])
///     }
/// }
/// ```
pub trait ObjectDetector: Send {
    /// Error type for detection failures.
    type Error: fmt::Display;

    /// Run inference on `frame` and return upright, normalized detections of
    /// the classes `filter` allows.
    fn detect(
        &mut self,
        frame: &Frame,
        filter: &ClassFilter,
        orientation: Orientation,
    ) -> Result<Vec<Detection>, Self::Error>;
}
