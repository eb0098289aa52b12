//! A single tracked object hypothesis.

use std::fmt;
use std::time::{Duration, Instant};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::anchor::AnchorId;
use crate::candidate::status::{MatchStatus, RejectReason};
use crate::error::TransitionError;
use crate::geometry::Rect;

/// Stable candidate identifier, unique for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tracked physical-object hypothesis under evaluation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: CandidateId,
    /// Detector class label, e.g. `"car"`.
    pub label: String,
    /// Most recent normalized box in upright image space.
    pub bbox: Rect,
    /// Detector confidence at creation.
    pub confidence: f32,
    pub status: MatchStatus,
    pub reject_reason: Option<RejectReason>,
    pub detected_description: Option<String>,
    pub ocr_text: Option<String>,
    /// Bound spatial anchor; set at most once.
    pub anchor_id: Option<AnchorId>,
    /// Appearance feature vector for re-identification.
    pub embedding: Option<Array1<f32>>,
    /// Last known bearing in degrees, negative to the left.
    pub degrees: f32,
    pub created_at: Instant,
    pub status_changed_at: Instant,
}

impl Candidate {
    pub fn new(id: CandidateId, label: impl Into<String>, bbox: Rect, confidence: f32, now: Instant) -> Self {
        Self {
            id,
            label: label.into(),
            bbox,
            confidence,
            status: MatchStatus::Unknown,
            reject_reason: None,
            detected_description: None,
            ocr_text: None,
            anchor_id: None,
            embedding: None,
            degrees: 0.0,
            created_at: now,
            status_changed_at: now,
        }
    }

    pub fn with_embedding(mut self, embedding: Option<Array1<f32>>) -> Self {
        self.embedding = embedding;
        self
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `to`, enforcing the status rules.
    ///
    /// Returns `Ok(true)` when the status actually changed and `Ok(false)` for
    /// an allowed self-transition. `Rejected -> Unknown` requires the current
    /// reject reason to be retryable.
    pub fn transition(&mut self, to: MatchStatus, now: Instant) -> Result<bool, TransitionError> {
        let retry_blocked = self.status == MatchStatus::Rejected
            && to == MatchStatus::Unknown
            && !self.reject_reason.is_some_and(RejectReason::is_retryable);

        if !self.status.can_transition_to(to) || retry_blocked {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to,
            });
        }
        if self.status == to {
            return Ok(false);
        }
        self.status = to;
        self.status_changed_at = now;
        Ok(true)
    }

    /// Return a retryable rejection to `Unknown` once `cooldown` has elapsed
    /// since the rejection. The reason is kept so feedback can mention it.
    pub fn try_retry(&mut self, now: Instant, cooldown: Duration) -> bool {
        if self.status != MatchStatus::Rejected {
            return false;
        }
        if now.saturating_duration_since(self.status_changed_at) < cooldown {
            return false;
        }
        self.transition(MatchStatus::Unknown, now).unwrap_or(false)
    }

    /// Bind a spatial anchor. A second binding is refused.
    pub fn bind_anchor(&mut self, anchor: AnchorId) -> bool {
        if self.anchor_id.is_some() {
            return false;
        }
        self.anchor_id = Some(anchor);
        true
    }

    /// Time spent in the current status.
    pub fn status_age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.status_changed_at)
    }
}
