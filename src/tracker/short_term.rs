//! Per-frame advancement of every candidate's tracking handle.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, warn};

use crate::candidate::{CandidateId, CandidateStore, MatchStatus};
use crate::config::TrackerConfig;
use crate::diagnostics::Diagnostics;
use crate::error::TrackingError;
use crate::frame::Frame;
use crate::geometry::{Orientation, Rect};
use crate::tracker::backend::{TrackOutcome, TrackRequest, TrackingBackend};
use crate::tracker::handle::{BoxSmoother, HandlePhase, TrackingHandle};
use crate::tracker::kalman_filter::KalmanFilter;

/// What one tracker tick did to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerReport {
    /// Candidates whose box was refreshed.
    pub updated: Vec<CandidateId>,
    /// Candidates marked lost this tick; removed on the next one.
    pub lost: Vec<CandidateId>,
    /// Candidates removed from the store this tick.
    pub reaped: Vec<CandidateId>,
}

/// Owns every candidate's tracking handle and advances them once per frame.
pub struct ShortTermTracker<B: TrackingBackend> {
    backend: B,
    handles: HashMap<CandidateId, TrackingHandle<B::State>>,
    min_confidence: f32,
    kalman_filter: Option<KalmanFilter>,
    diag: Diagnostics,
}

impl<B: TrackingBackend> ShortTermTracker<B> {
    pub fn new(backend: B, config: &TrackerConfig, diag: Diagnostics) -> Self {
        Self {
            backend,
            handles: HashMap::new(),
            min_confidence: config.min_confidence,
            kalman_filter: config.smooth_boxes.then(KalmanFilter::new),
            diag,
        }
    }

    /// Start a handle for a newly created candidate.
    pub fn begin(
        &mut self,
        id: CandidateId,
        frame: &Frame,
        orientation: Orientation,
        bbox: Rect,
    ) -> Result<(), TrackingError> {
        let state = self.backend.start(frame, orientation, bbox)?;
        let smoother = self
            .kalman_filter
            .as_ref()
            .map(|kf| BoxSmoother::new(kf, bbox));
        self.handles.insert(id, TrackingHandle::new(state, smoother));
        Ok(())
    }

    /// Mark a handle for two-phase retirement; the candidate is removed
    /// from the store after the handle's final advance on the next tick.
    pub fn retire(&mut self, id: CandidateId) -> bool {
        self.handles.get_mut(&id).is_some_and(|h| h.retire())
    }

    pub fn phase(&self, id: CandidateId) -> Option<HandlePhase> {
        self.handles.get(&id).map(|h| h.phase)
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Advance every handle against `frame` and apply the results to `store`.
    ///
    /// Never fails: a backend error still reaps the handles that were
    /// retiring and leaves active handles for the next tick.
    pub fn tick(
        &mut self,
        frame: &Frame,
        orientation: Orientation,
        store: &CandidateStore,
        now: Instant,
    ) -> TrackerReport {
        let span = self.diag.span().clone();
        let _enter = span.enter();
        let mut report = TrackerReport::default();

        // A candidate removed behind our back still gets its final advance.
        for (id, handle) in self.handles.iter_mut() {
            if handle.phase == HandlePhase::Active && !store.contains(*id) {
                debug!(candidate = %id, "candidate vanished; retiring handle");
                handle.retire();
            }
        }

        let mut ids = Vec::with_capacity(self.handles.len());
        let mut phases = Vec::with_capacity(self.handles.len());
        let mut requests = Vec::with_capacity(self.handles.len());
        for (id, handle) in self.handles.iter_mut() {
            if handle.phase == HandlePhase::Reaped {
                continue;
            }
            ids.push(*id);
            phases.push(handle.phase);
            requests.push(TrackRequest {
                state: &mut handle.state,
                last_frame: handle.phase == HandlePhase::Retiring,
            });
        }

        if requests.is_empty() {
            return report;
        }

        let result = self.backend.track(frame, orientation, &mut requests);
        drop(requests);

        match result {
            Ok(outcomes) => {
                if outcomes.len() != ids.len() {
                    warn!(
                        expected = ids.len(),
                        got = outcomes.len(),
                        "tracking backend returned a mismatched batch"
                    );
                }
                for (i, (id, phase)) in ids.iter().zip(&phases).enumerate() {
                    match phase {
                        HandlePhase::Retiring => self.reap(*id, store, &mut report),
                        HandlePhase::Active => {
                            if let Some(outcome) = outcomes.get(i) {
                                self.apply(*id, *outcome, store, now, &mut report);
                            }
                        }
                        HandlePhase::Reaped => {}
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "tracking request failed; reaping retiring handles only");
                for (id, phase) in ids.iter().zip(&phases) {
                    if *phase == HandlePhase::Retiring {
                        self.reap(*id, store, &mut report);
                    }
                }
            }
        }

        self.handles.retain(|_, h| h.phase != HandlePhase::Reaped);
        report
    }

    fn apply(
        &mut self,
        id: CandidateId,
        outcome: TrackOutcome,
        store: &CandidateStore,
        now: Instant,
        report: &mut TrackerReport,
    ) {
        let Some(handle) = self.handles.get_mut(&id) else {
            return;
        };

        match outcome {
            TrackOutcome::Tracked { bbox, confidence } if confidence >= self.min_confidence => {
                let bbox = match (&mut handle.smoother, &self.kalman_filter) {
                    (Some(smoother), Some(kf)) => smoother.step(kf, bbox),
                    _ => bbox.clamped(),
                };
                if store.update(id, |c| c.bbox = bbox) {
                    report.updated.push(id);
                } else {
                    handle.retire();
                }
            }
            _ => {
                handle.retire();
                store.update(id, |c| {
                    if let Err(err) = c.transition(MatchStatus::Lost, now) {
                        debug!(error = %err, "lost transition skipped");
                    }
                });
                debug!(candidate = %id, "track lost");
                report.lost.push(id);
            }
        }
    }

    fn reap(&mut self, id: CandidateId, store: &CandidateStore, report: &mut TrackerReport) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.phase = HandlePhase::Reaped;
        }
        if store.remove(id).is_some() {
            debug!(candidate = %id, "candidate reaped");
        }
        report.reaped.push(id);
    }
}
