use serde::{Deserialize, Serialize};

/// Verification status of a candidate.
///
/// ```text
/// Unknown ──► Waiting ──► Full | Partial | Rejected
///    ▲           │                          │
///    └───────────┘ (transient failure)      │
///    └──────────────────────────────────────┘ (retryable reason, after cooldown)
///
/// any non-terminal ──► Lost | Expired   (terminal)
/// ```
///
/// `Full` is sticky: the only ways out are `Lost` and `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Not yet verified, or eligible for another verification attempt.
    #[default]
    Unknown,
    /// A verification request is in flight.
    Waiting,
    /// Object class matches but the description only partly does.
    Partial,
    /// Confirmed match.
    Full,
    /// Verification did not confirm a match.
    Rejected,
    /// Tracking failed; the candidate is about to be removed.
    Lost,
    /// Retired by the expiration policy; about to be removed.
    Expired,
}

impl MatchStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Lost | MatchStatus::Expired)
    }

    /// Whether the transition `self -> to` is allowed by status alone.
    ///
    /// Self-transitions of non-terminal states are allowed and act as a
    /// refresh. `Rejected -> Unknown` additionally requires a retryable
    /// reason, which [`Candidate::transition`](super::Candidate::transition)
    /// checks.
    pub fn can_transition_to(self, to: MatchStatus) -> bool {
        use MatchStatus::*;

        if self.is_terminal() {
            return false;
        }
        if self == to {
            return true;
        }
        match (self, to) {
            (_, Lost) | (_, Expired) => true,
            (Unknown, Waiting | Full | Partial | Rejected) => true,
            (Waiting, Full | Partial | Rejected | Unknown) => true,
            (Rejected, Unknown) => true,
            _ => false,
        }
    }

    /// Announcement priority; higher wins.
    pub fn priority(self) -> u8 {
        match self {
            MatchStatus::Full => 3,
            MatchStatus::Partial => 2,
            MatchStatus::Rejected => 1,
            _ => 0,
        }
    }
}

/// Why verification did not confirm a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The object is not of the requested class.
    WrongObjectClass,
    /// The object contradicts the description.
    DescriptionMismatch,
    /// A plate was read and it is not the requested one.
    LicensePlateMismatch,
    /// The image was too blurry to judge.
    BlurryImage,
    /// Not enough of the object was visible.
    InsufficientInfo,
    /// The plate could not be read from this angle.
    LicensePlateNotVisible,
    /// The service was unsure.
    LowConfidence,
    /// The verification service could not be reached.
    Network,
    /// The service gave no usable reason.
    #[serde(other)]
    Unspecified,
}

impl RejectReason {
    /// Whether verification may be attempted again after a cooldown.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            RejectReason::WrongObjectClass
                | RejectReason::DescriptionMismatch
                | RejectReason::LicensePlateMismatch
        )
    }
}
