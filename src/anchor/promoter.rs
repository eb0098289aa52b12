//! Promotion of 2D tracked candidates into anchored 3D objects.

use tracing::{debug, trace};

use crate::anchor::registry::AnchorRegistry;
use crate::anchor::session::{AnchorId, SpatialSession};
use crate::candidate::{CandidateId, CandidateStore, MatchStatus};
use crate::diagnostics::Diagnostics;
use crate::geometry::{Orientation, Size, image_point_to_view};

/// What one promotion tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionReport {
    pub raycasts: usize,
    pub promoted: Vec<(CandidateId, AnchorId)>,
}

/// Binds candidates to spatial anchors once anything has matched.
///
/// Promotion is gated globally: until some candidate has been `Full` no ray
/// is cast at all. The gate latches, so it stays open after that candidate
/// is lost or expires. Every un-anchored, non-terminal candidate is then ray
/// cast once per tick until a hit binds it. Anchored candidates are never ray
/// cast again.
pub struct AnchorPromoter {
    registry: AnchorRegistry,
    matched_once: bool,
    diag: Diagnostics,
}

impl AnchorPromoter {
    pub fn new(diag: Diagnostics) -> Self {
        Self {
            registry: AnchorRegistry::new(),
            matched_once: false,
            diag,
        }
    }

    pub fn registry(&self) -> &AnchorRegistry {
        &self.registry
    }

    /// Whether any candidate has reached `Full` yet.
    pub fn has_matched(&self) -> bool {
        self.matched_once
    }

    pub fn tick(
        &mut self,
        session: &dyn SpatialSession,
        orientation: Orientation,
        image_size: Size,
        view_bounds: Size,
        store: &CandidateStore,
    ) -> PromotionReport {
        let span = self.diag.span().clone();
        let _enter = span.enter();
        let mut report = PromotionReport::default();

        let snapshot = store.snapshot();
        self.registry
            .retain(|id| snapshot.iter().any(|c| c.id == id));

        if !self.matched_once {
            if !snapshot.iter().any(|c| c.status == MatchStatus::Full) {
                return report;
            }
            debug!("first full match; promotion enabled");
            self.matched_once = true;
        }

        for candidate in snapshot
            .iter()
            .filter(|c| c.anchor_id.is_none() && !c.is_terminal())
        {
            let Some(view_point) =
                image_point_to_view(candidate.bbox.center(), orientation, image_size, view_bounds)
            else {
                continue;
            };

            report.raycasts += 1;
            let Some(hit) = session.raycast(view_point) else {
                trace!(candidate = %candidate.id, "ray cast missed");
                continue;
            };

            let anchor = session.create_anchor(&hit);
            let mut bound = false;
            store.update(candidate.id, |c| bound = c.bind_anchor(anchor));
            if bound {
                self.registry.register(candidate.id, anchor, hit);
                debug!(candidate = %candidate.id, %anchor, "candidate anchored");
                report.promoted.push((candidate.id, anchor));
            } else {
                debug!(candidate = %candidate.id, %anchor, "candidate gone or already anchored; anchor unused");
            }
        }

        if let Some(camera) = session.camera_transform() {
            for candidate in snapshot.iter().filter(|c| c.anchor_id.is_some()) {
                if let Some(bearing) = self.registry.bearing_degrees(candidate.id, &camera) {
                    store.update(candidate.id, |c| c.degrees = bearing);
                }
            }
        }

        report
    }
}
