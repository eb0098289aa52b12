//! Per-frame sequencing of tracking, detection, promotion and verification.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::anchor::{AnchorPromoter, SpatialSession, WorldTransform, bearing_between};
use crate::candidate::{Candidate, CandidateId, CandidateStore, MatchStatus};
use crate::config::{PipelineConfig, PolicyConfig};
use crate::detection::{ClassFilter, DetectorAdapter, ObjectDetector};
use crate::diagnostics::Diagnostics;
use crate::error::{ConfigError, Error};
use crate::frame::Frame;
use crate::geometry::{Orientation, Size, bearing_from_box};
use crate::pipeline::snapshot::{CandidateView, PresentationSnapshot};
use crate::tracker::{ShortTermTracker, TrackingBackend};
use crate::verify::{HttpOracle, VerificationOracle, Verifier};

/// Everything the frame source delivers for one capture tick.
pub struct FrameContext<'a> {
    pub frame: &'a Frame,
    pub orientation: Orientation,
    pub session: &'a dyn SpatialSession,
    /// Size of the captured buffer in pixels, before orientation is applied.
    pub image_size: Size,
    /// Size of the view the image is shown in, in points.
    pub view_bounds: Size,
    pub timestamp: Instant,
}

/// Last sighting of a candidate whose tracking was lost.
#[derive(Debug, Clone)]
struct LostSighting {
    view: CandidateView,
    /// Pose of its anchor, if it had one, for re-projecting the bearing.
    anchor: Option<WorldTransform>,
    since: Instant,
}

/// Runs every stage once per frame and publishes a snapshot.
///
/// Stage order: tracking, detection (every `detect_every_n_frames` frames,
/// starting with the first), housekeeping, anchor promotion, verification.
/// Verification runs on the runtime behind the given handle and is never
/// awaited here.
pub struct FramePipeline<B: TrackingBackend, D: ObjectDetector> {
    store: CandidateStore,
    tracker: ShortTermTracker<B>,
    detector: D,
    adapter: DetectorAdapter,
    class_filter: ClassFilter,
    promoter: AnchorPromoter,
    verifier: Verifier,
    policy: PolicyConfig,
    detect_every_n_frames: u64,
    frame_index: u64,
    lost: BTreeMap<CandidateId, LostSighting>,
    snapshots: watch::Sender<PresentationSnapshot>,
    diag: Diagnostics,
}

impl<B: TrackingBackend, D: ObjectDetector> FramePipeline<B, D> {
    pub fn new(
        config: &PipelineConfig,
        backend: B,
        detector: D,
        oracle: Arc<dyn VerificationOracle>,
        runtime: Handle,
        diag: Diagnostics,
    ) -> Self {
        let class_filter = ClassFilter::new(config.detector.classes.iter().cloned());
        let verifier = Verifier::new(
            oracle,
            runtime,
            &config.verifier,
            class_filter.labels().to_vec(),
            diag.child("verifier"),
        );
        let (snapshots, _) = watch::channel(PresentationSnapshot::default());

        Self {
            store: CandidateStore::new(),
            tracker: ShortTermTracker::new(backend, &config.tracker, diag.child("tracker")),
            detector,
            adapter: DetectorAdapter::new(&config.detector, diag.child("detector")),
            class_filter,
            promoter: AnchorPromoter::new(diag.child("promoter")),
            verifier,
            policy: config.policy.clone(),
            detect_every_n_frames: u64::from(config.detector.detect_every_n_frames.max(1)),
            frame_index: 0,
            lost: BTreeMap::new(),
            snapshots,
            diag,
        }
    }

    /// Build a pipeline that verifies through the configured HTTP endpoint.
    ///
    /// # Errors
    ///
    /// Fails when the config does not validate, when no
    /// `verifier.endpoint` is set, or when the HTTP client cannot be built.
    pub fn with_http_oracle(
        config: &PipelineConfig,
        backend: B,
        detector: D,
        runtime: Handle,
        diag: Diagnostics,
    ) -> Result<Self, Error> {
        config.validate()?;
        let oracle = HttpOracle::from_config(&config.verifier)?.ok_or(ConfigError::Invalid {
            field: "verifier.endpoint",
            reason: "required for HTTP verification".into(),
        })?;
        info!(endpoint = oracle.endpoint(), "verifying over HTTP");
        Ok(Self::new(config, backend, detector, Arc::new(oracle), runtime, diag))
    }

    pub fn store(&self) -> &CandidateStore {
        &self.store
    }

    pub fn tracker(&self) -> &ShortTermTracker<B> {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ShortTermTracker<B> {
        &mut self.tracker
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn promoter(&self) -> &AnchorPromoter {
        &self.promoter
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Receiver for the snapshot published after every frame.
    pub fn subscribe(&self) -> watch::Receiver<PresentationSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn process_frame(&mut self, ctx: FrameContext<'_>) -> PresentationSnapshot {
        let span = self.diag.span().clone();
        let _enter = span.enter();
        self.frame_index += 1;
        let now = ctx.timestamp;

        let tracking = self.tracker.tick(ctx.frame, ctx.orientation, &self.store, now);
        if !tracking.lost.is_empty() || !tracking.reaped.is_empty() {
            debug!(lost = ?tracking.lost, reaped = ?tracking.reaped, "tracking changes");
        }
        self.remember_lost(&tracking.lost, now);

        if (self.frame_index - 1) % self.detect_every_n_frames == 0 {
            self.detect(&ctx, now);
        }

        self.housekeeping(ctx.session, now);

        self.promoter.tick(
            ctx.session,
            ctx.orientation,
            ctx.image_size,
            ctx.view_bounds,
            &self.store,
        );

        self.verifier.tick(ctx.frame, ctx.orientation, &self.store, now);

        let lingering = self.lingering_lost(ctx.session, now);
        let snapshot = PresentationSnapshot::new(self.frame_index, &self.store.snapshot()).with_lost(lingering);
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    /// Record the last sighting of candidates the tracker just marked lost.
    /// They are still in the store until the next tick reaps them.
    fn remember_lost(&mut self, ids: &[CandidateId], now: Instant) {
        for &id in ids {
            let Some(candidate) = self.store.get(id) else {
                continue;
            };
            if candidate.status != MatchStatus::Lost {
                continue;
            }
            let anchor = self.promoter.registry().transform_for(id).copied();
            self.lost.insert(
                id,
                LostSighting {
                    view: CandidateView::from(&candidate),
                    anchor,
                    since: now,
                },
            );
        }
    }

    /// Lost candidates that already left the store, while they linger.
    fn lingering_lost(&mut self, session: &dyn SpatialSession, now: Instant) -> Vec<CandidateView> {
        let linger = self.policy.lost_linger();
        self.lost
            .retain(|_, sighting| now.saturating_duration_since(sighting.since) < linger);
        if self.lost.is_empty() {
            return Vec::new();
        }

        let camera = session.camera_transform();
        self.lost
            .iter()
            .filter(|(id, _)| !self.store.contains(**id))
            .map(|(_, sighting)| {
                let mut view = sighting.view.clone();
                if let (Some(anchor), Some(camera)) = (&sighting.anchor, &camera) {
                    view.degrees = bearing_between(anchor, camera);
                }
                view
            })
            .collect()
    }

    fn detect(&mut self, ctx: &FrameContext<'_>, now: Instant) {
        let detections = match self
            .detector
            .detect(ctx.frame, &self.class_filter, ctx.orientation)
        {
            Ok(detections) => detections,
            Err(e) => {
                warn!(error = %e, "detection failed");
                return;
            }
        };

        let existing = self.store.snapshot();
        for detection in self.adapter.admit(detections, &self.class_filter, &existing) {
            let id = self.store.allocate_id();
            if let Err(e) = self
                .tracker
                .begin(id, ctx.frame, ctx.orientation, detection.bbox)
            {
                warn!(error = %e, "could not start tracking; detection dropped");
                continue;
            }
            let candidate = Candidate::new(id, detection.label, detection.bbox, detection.confidence, now)
                .with_embedding(detection.embedding);
            match self.store.insert(candidate) {
                Ok(()) => info!(candidate = %id, "new candidate"),
                Err(e) => {
                    warn!(error = %e, "candidate not inserted");
                    self.tracker.retire(id);
                }
            }
        }
    }

    /// Retry cooldowns, expiration and bearing of un-anchored candidates.
    fn housekeeping(&mut self, session: &dyn SpatialSession, now: Instant) {
        let cooldown = self.policy.retry_cooldown();
        let camera = session.camera_transform();

        for candidate in self.store.snapshot() {
            if candidate.is_terminal() {
                continue;
            }

            if candidate.status == MatchStatus::Rejected {
                let mut retried = false;
                self.store
                    .update(candidate.id, |c| retried = c.try_retry(now, cooldown));
                if retried {
                    debug!(candidate = %candidate.id, "rejection cooled down; eligible again");
                }
            }

            if self.should_expire(&candidate, camera.as_ref(), now) {
                let mut expired = false;
                self.store.update(candidate.id, |c| {
                    expired = c.transition(MatchStatus::Expired, now).unwrap_or(false);
                });
                if expired {
                    self.tracker.retire(candidate.id);
                    info!(candidate = %candidate.id, "candidate expired");
                }
                continue;
            }

            if candidate.anchor_id.is_none() {
                let bearing = bearing_from_box(&candidate.bbox, self.policy.horizontal_fov_degrees);
                self.store.update(candidate.id, |c| c.degrees = bearing);
            }
        }
    }

    fn should_expire(&self, candidate: &Candidate, camera: Option<&WorldTransform>, now: Instant) -> bool {
        if !matches!(candidate.status, MatchStatus::Full | MatchStatus::Partial) {
            return false;
        }
        let too_old = self
            .policy
            .expire_after()
            .is_some_and(|limit| candidate.status_age(now) >= limit);
        let too_far = match (self.policy.expire_beyond_meters, camera) {
            (Some(limit), Some(camera)) => self
                .promoter
                .registry()
                .distance(candidate.id, camera)
                .is_some_and(|d| d > limit),
            _ => false,
        };
        too_old || too_far
    }
}
