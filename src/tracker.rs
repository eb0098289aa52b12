mod backend;
mod handle;
mod kalman_filter;
mod short_term;

pub use backend::{TrackOutcome, TrackRequest, TrackingBackend};
pub use handle::HandlePhase;
pub use short_term::{ShortTermTracker, TrackerReport};
