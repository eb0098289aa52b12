//! The remote verification seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::candidate::{MatchStatus, RejectReason};
use crate::error::OracleError;
use crate::verify::crop::CroppedImage;

/// What the verification service is asked.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Upright crop of the candidate's region.
    pub image: CroppedImage,
    /// Object classes that count as the target, e.g. `["car"]`.
    pub target_classes: Vec<String>,
    /// Free-text description of the target.
    pub description: String,
}

/// The service's verdict on one crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Full,
    Partial,
    Rejected,
    /// The service could not decide; treated as a retryable rejection.
    #[serde(alias = "unknown")]
    Inconclusive,
}

/// Response from the verification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResponse {
    #[serde(rename = "match_status")]
    pub verdict: Verdict,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reject_reason: Option<RejectReason>,
}

impl VerificationResponse {
    pub fn full() -> Self {
        Self {
            verdict: Verdict::Full,
            ocr_text: None,
            description: None,
            reject_reason: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            verdict: Verdict::Rejected,
            ocr_text: None,
            description: None,
            reject_reason: Some(reason),
        }
    }

    pub fn with_ocr_text(mut self, text: impl Into<String>) -> Self {
        self.ocr_text = Some(text.into());
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Status and reason this verdict maps onto.
    pub fn outcome(&self) -> (MatchStatus, Option<RejectReason>) {
        match self.verdict {
            Verdict::Full => (MatchStatus::Full, None),
            Verdict::Partial => (MatchStatus::Partial, self.reject_reason),
            Verdict::Rejected => (
                MatchStatus::Rejected,
                Some(self.reject_reason.unwrap_or(RejectReason::DescriptionMismatch)),
            ),
            Verdict::Inconclusive => (
                MatchStatus::Rejected,
                Some(self.reject_reason.unwrap_or(RejectReason::LowConfidence)),
            ),
        }
    }
}

/// A remote classifier that decides whether a crop shows the target.
#[async_trait]
pub trait VerificationOracle: Send + Sync {
    async fn verify(&self, request: VerificationRequest) -> Result<VerificationResponse, OracleError>;
}
