//! Trait for the per-frame object tracking primitive.

use crate::error::TrackingError;
use crate::frame::Frame;
use crate::geometry::{Orientation, Rect};

/// One handle's slot in a batch tracking call.
pub struct TrackRequest<'a, S> {
    /// Backend-owned tracking state for one candidate.
    pub state: &'a mut S,
    /// This is the handle's final advance; the backend should release any
    /// resources it holds for it.
    pub last_frame: bool,
}

/// Result of advancing one handle by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackOutcome {
    /// Object found at `bbox` (normalized, upright) with `confidence`.
    Tracked { bbox: Rect, confidence: f32 },
    /// The object left the frame or the tracker gave up on it.
    Failed,
}

/// A short-term visual tracker that advances many handles per frame.
///
/// Implement this over whatever tracking primitive the platform offers.
///
/// # Example
///
/// ```ignore
/// use seektrack_rs::{TrackingBackend, TrackRequest, TrackOutcome, Frame, Orientation, Rect};
///
/// struct MyTracker;
///
/// impl TrackingBackend for MyTracker {
///     type State = Rect;
///
///     fn start(&mut self, _: &Frame, _: Orientation, bbox: Rect) -> Result<Rect, TrackingError> {
///         Ok(bbox)
///     }
///
///     fn track(
///         &mut self,
///         _: &Frame,
///         _: Orientation,
///         requests: &mut [TrackRequest<'_, Rect>],
///     ) -> Result<Vec<TrackOutcome>, TrackingError> {
///         Ok(requests
///             .iter()
///             .map(|r| TrackOutcome::Tracked { bbox: *r.state, confidence: 1.0 })
///             .collect())
///     }
/// }
/// ```
pub trait TrackingBackend: Send {
    /// Per-handle state.
    type State: Send;

    /// Begin tracking the object inside `bbox` on `frame`.
    fn start(
        &mut self,
        frame: &Frame,
        orientation: Orientation,
        bbox: Rect,
    ) -> Result<Self::State, TrackingError>;

    /// Advance every request against `frame`.
    ///
    /// Returns one outcome per request, in request order.
    fn track(
        &mut self,
        frame: &Frame,
        orientation: Orientation,
        requests: &mut [TrackRequest<'_, Self::State>],
    ) -> Result<Vec<TrackOutcome>, TrackingError>;
}
