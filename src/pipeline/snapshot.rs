use serde::{Deserialize, Serialize};

use crate::anchor::AnchorId;
use crate::candidate::{Candidate, CandidateId, MatchStatus, RejectReason};
use crate::geometry::Rect;

/// Read-only view of one candidate for presentation and feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateView {
    pub id: CandidateId,
    pub label: String,
    pub bbox: Rect,
    pub status: MatchStatus,
    pub reject_reason: Option<RejectReason>,
    pub ocr_text: Option<String>,
    pub detected_description: Option<String>,
    pub anchor_id: Option<AnchorId>,
    pub degrees: f32,
}

impl From<&Candidate> for CandidateView {
    fn from(c: &Candidate) -> Self {
        Self {
            id: c.id,
            label: c.label.clone(),
            bbox: c.bbox,
            status: c.status,
            reject_reason: c.reject_reason,
            ocr_text: c.ocr_text.clone(),
            detected_description: c.detected_description.clone(),
            anchor_id: c.anchor_id,
            degrees: c.degrees,
        }
    }
}

/// What the pipeline publishes after every frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationSnapshot {
    /// Index of the frame this snapshot was taken after, starting at 1.
    pub frame_index: u64,
    /// Candidates in creation order.
    pub candidates: Vec<CandidateView>,
    /// Candidates whose tracking was lost and that have already left the
    /// store, kept for a while so feedback can say where they were last seen.
    /// Bearings of anchored entries follow the camera.
    #[serde(default)]
    pub lost: Vec<CandidateView>,
}

impl PresentationSnapshot {
    pub fn new(frame_index: u64, candidates: &[Candidate]) -> Self {
        Self {
            frame_index,
            candidates: candidates.iter().map(CandidateView::from).collect(),
            lost: Vec::new(),
        }
    }

    pub fn with_lost(mut self, lost: Vec<CandidateView>) -> Self {
        self.lost = lost;
        self
    }

    pub fn get(&self, id: CandidateId) -> Option<&CandidateView> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn with_status(&self, status: MatchStatus) -> impl Iterator<Item = &CandidateView> {
        self.candidates.iter().filter(move |c| c.status == status)
    }

    /// Every `Lost` candidate, still stored or lingering.
    pub fn lost_candidates(&self) -> impl Iterator<Item = &CandidateView> {
        self.with_status(MatchStatus::Lost).chain(&self.lost)
    }

    /// Whether no live candidate is present. Lingering lost entries do not count.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
