//! Error types for the candidate pipeline.
//!
//! Per-frame stages never surface these to the frame source; they are logged
//! and the affected work is retried on the next tick. Only construction-time
//! operations hand an [`Error`] back to the caller.

use thiserror::Error;

use crate::candidate::{CandidateId, MatchStatus};

/// Crate-level error aggregating every concern.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("candidate {0} is already present in the store")]
    DuplicateId(CandidateId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("candidate {id}: illegal status transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub id: CandidateId,
    pub from: MatchStatus,
    pub to: MatchStatus,
}

/// Failure of the batch tracking primitive for one frame.
#[derive(Error, Debug, Clone)]
pub enum TrackingError {
    #[error("tracking request failed: {0}")]
    Backend(String),

    #[error("frame buffer rejected by tracker: {0}")]
    InvalidFrame(String),
}

/// Failure talking to the remote verification service.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("verification request timed out")]
    Timeout,

    #[error("unexpected response format: {0}")]
    BadResponse(String),

    #[error("image encoding failed: {0}")]
    Encode(String),
}

/// Failure to cut a candidate's region out of a frame buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("frame buffer has {actual} bytes, expected {expected} for {width}x{height} RGB")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("crop region is empty")]
    EmptyRegion,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
