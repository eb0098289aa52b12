//! Deduplication of fresh detections against tracked candidates.

use ndarray::Array2;
use tracing::debug;

use crate::candidate::Candidate;
use crate::config::DetectorConfig;
use crate::detection::detector::{ClassFilter, Detection};
use crate::diagnostics::Diagnostics;
use crate::geometry::{Rect, cosine_distance, iou_batch, linear_assignment};

/// Decides which detections describe objects no candidate covers yet.
#[derive(Debug, Clone)]
pub struct DetectorAdapter {
    iou_threshold: f32,
    min_confidence: f32,
    reid_max_distance: Option<f32>,
    diag: Diagnostics,
}

impl DetectorAdapter {
    pub fn new(config: &DetectorConfig, diag: Diagnostics) -> Self {
        Self {
            iou_threshold: config.iou_threshold,
            min_confidence: config.min_confidence,
            reid_max_distance: config.enable_reid.then_some(config.reid_max_distance),
            diag,
        }
    }

    /// Keep only detections that should become new candidates.
    ///
    /// A detection is dropped when it is below the confidence floor, outside
    /// `filter`, overlaps an existing candidate's box with IoU at or above
    /// the threshold, overlaps a better detection in the same batch, or is
    /// re-identified by appearance as an existing candidate.
    pub fn admit(
        &self,
        detections: Vec<Detection>,
        filter: &ClassFilter,
        existing: &[Candidate],
    ) -> Vec<Detection> {
        let _enter = self.diag.span().enter();

        let mut fresh: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence && filter.allows(&d.label))
            .collect();
        fresh.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<Detection> = Vec::with_capacity(fresh.len());
        for det in fresh {
            if kept.iter().all(|k| k.bbox.iou(&det.bbox) < self.iou_threshold) {
                kept.push(det);
            }
        }

        let existing_boxes: Vec<Rect> = existing.iter().map(|c| c.bbox).collect();
        let kept_boxes: Vec<Rect> = kept.iter().map(|d| d.bbox).collect();
        let ious = iou_batch(&kept_boxes, &existing_boxes);

        let mut survivors: Vec<Detection> = kept
            .into_iter()
            .enumerate()
            .filter(|(i, det)| {
                let duplicate = ious
                    .row(*i)
                    .iter()
                    .any(|&iou| iou >= self.iou_threshold);
                if duplicate {
                    debug!(label = %det.label, "detection overlaps an existing candidate");
                }
                !duplicate
            })
            .map(|(_, det)| det)
            .collect();

        if let Some(max_distance) = self.reid_max_distance {
            survivors = self.drop_reidentified(survivors, existing, max_distance);
        }
        survivors
    }

    fn drop_reidentified(
        &self,
        detections: Vec<Detection>,
        existing: &[Candidate],
        max_distance: f32,
    ) -> Vec<Detection> {
        let rows: Vec<usize> = detections
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.embedding.as_ref().map(|_| i))
            .collect();
        let cols: Vec<&Candidate> = existing
            .iter()
            .filter(|c| c.embedding.is_some() && !c.is_terminal())
            .collect();
        if rows.is_empty() || cols.is_empty() {
            return detections;
        }

        let mut cost = Array2::<f32>::from_elem((rows.len(), cols.len()), 1.0);
        for (r, &i) in rows.iter().enumerate() {
            for (c, candidate) in cols.iter().enumerate() {
                if let (Some(a), Some(b)) = (&detections[i].embedding, &candidate.embedding) {
                    cost[[r, c]] = cosine_distance(a, b);
                }
            }
        }

        let assignment = linear_assignment(&cost, max_distance);
        let mut reidentified = vec![false; detections.len()];
        for (r, c) in assignment.matches {
            debug!(candidate = %cols[c].id, "detection re-identified by appearance");
            reidentified[rows[r]] = true;
        }

        detections
            .into_iter()
            .zip(reidentified)
            .filter_map(|(d, dup)| (!dup).then_some(d))
            .collect()
    }
}
