//! Builder for creating Detection objects from various input formats.

use ndarray::Array1;

use crate::detection::detector::Detection;
use crate::geometry::Rect;

/// Builder for creating `Detection` objects from various box formats.
///
/// Pixel coordinates can be normalized on the way in with [`normalize`](Self::normalize).
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    label: String,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    embedding: Option<Array1<f32>>,
}

impl DetectionBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.x1 = x;
        self.y1 = y;
        self.x2 = x + w;
        self.y2 = y + h;
        self
    }

    /// Divide the current pixel coordinates by the image size.
    pub fn normalize(mut self, width: f32, height: f32) -> Self {
        if width > 0.0 && height > 0.0 {
            self.x1 /= width;
            self.x2 /= width;
            self.y1 /= height;
            self.y2 /= height;
        }
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn embedding(mut self, embedding: Array1<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Build the final `Detection`, clipped to the unit square.
    pub fn build(self) -> Detection {
        Detection {
            label: self.label,
            bbox: Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2).clamped(),
            confidence: self.confidence,
            embedding: self.embedding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new("car")
            .tlwh(0.4, 0.4, 0.1, 0.1)
            .confidence(0.9)
            .build();

        assert_eq!(det.label, "car");
        assert_eq!(det.confidence, 0.9);
        assert!((det.bbox.width - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_pixels() {
        let det = DetectionBuilder::new("car")
            .tlbr(192.0, 108.0, 384.0, 216.0)
            .normalize(1920.0, 1080.0)
            .build();
        assert!((det.bbox.x - 0.1).abs() < 1e-6);
        assert!((det.bbox.height - 0.1).abs() < 1e-6);
    }
}
