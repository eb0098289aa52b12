//! Asynchronous verification of unknown candidates.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tracing::{Instrument, debug, info, warn};

use crate::candidate::{Candidate, CandidateId, CandidateStore, MatchStatus, RejectReason};
use crate::config::VerifierConfig;
use crate::diagnostics::Diagnostics;
use crate::error::OracleError;
use crate::frame::Frame;
use crate::geometry::Orientation;
use crate::verify::crop::{CroppedImage, crop_region};
use crate::verify::oracle::{VerificationOracle, VerificationRequest, VerificationResponse};

type InFlight = Arc<Mutex<HashSet<CandidateId>>>;

/// Submits unknown candidates to a [`VerificationOracle`] and applies the
/// verdicts to the store.
///
/// Requests run as tasks on the given runtime; [`Verifier::tick`] never
/// waits for them. At most one request per candidate is outstanding, and a
/// verdict for a candidate that left the store is dropped.
pub struct Verifier {
    oracle: Arc<dyn VerificationOracle>,
    runtime: Handle,
    in_flight: InFlight,
    last_attempt: HashMap<CandidateId, Instant>,
    target_classes: Vec<String>,
    description: String,
    min_resubmit_interval: Duration,
    request_timeout: Duration,
    crop_padding: f32,
    diag: Diagnostics,
}

impl Verifier {
    pub fn new(
        oracle: Arc<dyn VerificationOracle>,
        runtime: Handle,
        config: &VerifierConfig,
        target_classes: Vec<String>,
        diag: Diagnostics,
    ) -> Self {
        Self {
            oracle,
            runtime,
            in_flight: Arc::default(),
            last_attempt: HashMap::new(),
            target_classes,
            description: config.target_description.clone(),
            min_resubmit_interval: config.min_resubmit_interval(),
            request_timeout: config.request_timeout(),
            crop_padding: config.crop_padding,
            diag,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_in_flight(&self, id: CandidateId) -> bool {
        lock(&self.in_flight).contains(&id)
    }

    /// Submit every eligible `Unknown` candidate; returns the submitted ids.
    pub fn tick(
        &mut self,
        frame: &Frame,
        orientation: Orientation,
        store: &CandidateStore,
        now: Instant,
    ) -> Vec<CandidateId> {
        let span = self.diag.span().clone();
        let _enter = span.enter();

        let snapshot = store.snapshot();
        self.last_attempt
            .retain(|id, _| snapshot.iter().any(|c| c.id == *id));

        let mut submitted = Vec::new();
        for candidate in snapshot.iter().filter(|c| c.status == MatchStatus::Unknown) {
            if self.is_in_flight(candidate.id) {
                continue;
            }
            if let Some(last) = self.last_attempt.get(&candidate.id)
                && now.saturating_duration_since(*last) < self.min_resubmit_interval
            {
                continue;
            }
            self.last_attempt.insert(candidate.id, now);

            let image = match crop_region(frame, &candidate.bbox, orientation, self.crop_padding) {
                Ok(image) => image,
                Err(e) => {
                    warn!(candidate = %candidate.id, error = %e, "could not crop candidate");
                    continue;
                }
            };

            let mut waiting = false;
            store.update(candidate.id, |c| {
                waiting = c.transition(MatchStatus::Waiting, now).unwrap_or(false);
            });
            if !waiting {
                continue;
            }

            lock(&self.in_flight).insert(candidate.id);
            self.submit(candidate.id, image, store.clone());
            debug!(candidate = %candidate.id, "verification submitted");
            submitted.push(candidate.id);
        }
        submitted
    }

    fn submit(&self, id: CandidateId, image: CroppedImage, store: CandidateStore) {
        let request = VerificationRequest {
            image,
            target_classes: self.target_classes.clone(),
            description: self.description.clone(),
        };
        let oracle = Arc::clone(&self.oracle);
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.request_timeout;

        let task = async move {
            let outcome = tokio::time::timeout(timeout, oracle.verify(request))
                .await
                .unwrap_or(Err(OracleError::Timeout));
            let applied = store.update(id, |c| apply_outcome(c, outcome, Instant::now()));
            lock(&in_flight).remove(&id);
            if !applied {
                debug!(candidate = %id, "candidate removed before verification finished; verdict dropped");
            }
        };
        self.runtime.spawn(task.instrument(self.diag.span().clone()));
    }
}

fn lock(in_flight: &Mutex<HashSet<CandidateId>>) -> MutexGuard<'_, HashSet<CandidateId>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fold a verification outcome into a candidate.
///
/// A `Full` candidate is never downgraded and terminal candidates are left
/// alone. An oracle failure returns the candidate to `Unknown` with
/// [`RejectReason::Network`] so it is retried.
fn apply_outcome(
    candidate: &mut Candidate,
    outcome: Result<VerificationResponse, OracleError>,
    now: Instant,
) {
    if candidate.status == MatchStatus::Full || candidate.is_terminal() {
        debug!(candidate = %candidate.id, status = ?candidate.status, "verdict ignored");
        return;
    }

    match outcome {
        Ok(response) => {
            let (status, reason) = response.outcome();
            if let Err(e) = candidate.transition(status, now) {
                warn!(error = %e, "verdict not applied");
                return;
            }
            candidate.reject_reason = reason;
            if let Some(text) = response.ocr_text {
                candidate.ocr_text = Some(text);
            }
            if let Some(description) = response.description {
                candidate.detected_description = Some(description);
            }
            info!(candidate = %candidate.id, ?status, ?reason, "verification finished");
        }
        Err(e) => {
            warn!(candidate = %candidate.id, error = %e, "verification failed");
            if candidate.transition(MatchStatus::Unknown, now).is_ok() {
                candidate.reject_reason = Some(RejectReason::Network);
            }
        }
    }
}
