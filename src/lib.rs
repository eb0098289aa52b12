//! Candidate tracking, verification and non-visual feedback for finding a
//! specific physical object with a handheld camera.
//!
//! A [`FramePipeline`] is fed one frame at a time. It tracks candidates in
//! 2D, admits new detections, anchors candidates in 3D once something has
//! matched, verifies candidates against a remote oracle in the background,
//! and publishes a [`PresentationSnapshot`]. The [`feedback`] layer turns
//! those snapshots into speech and tone/haptic pulses.
//!
//! Platform collaborators plug in through traits: [`ObjectDetector`],
//! [`TrackingBackend`], [`SpatialSession`], [`VerificationOracle`],
//! [`SpeechOutput`] and [`PulseOutput`].

pub mod anchor;
pub mod candidate;
pub mod config;
pub mod detection;
pub mod diagnostics;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod tracker;
pub mod verify;

pub use anchor::{AnchorId, SpatialSession, WorldTransform};
pub use candidate::{Candidate, CandidateId, CandidateStore, MatchStatus, RejectReason};
pub use config::PipelineConfig;
pub use detection::{ClassFilter, Detection, DetectionBuilder, ObjectDetector};
pub use diagnostics::{Diagnostics, init_tracing};
pub use error::Error;
pub use feedback::{
    IntervalMapping, NavigationAnnouncer, ProximityController, PulseOutput, SpeechOutput,
    spawn_feedback_loop,
};
pub use frame::Frame;
pub use geometry::{Orientation, Rect, Size};
pub use pipeline::{CandidateView, FrameContext, FramePipeline, PresentationSnapshot};
pub use tracker::{TrackOutcome, TrackRequest, TrackingBackend};
pub use verify::{HttpOracle, VerificationOracle, VerificationRequest, VerificationResponse};
