//! Spoken phrase construction.

use crate::candidate::{MatchStatus, RejectReason};
use crate::pipeline::CandidateView;

/// Direction words for a bearing in degrees, negative to the left.
pub fn direction_words(degrees: f32) -> &'static str {
    let magnitude = degrees.abs();
    let left = degrees < 0.0;
    match (magnitude, left) {
        (m, _) if m < 10.0 => "straight ahead",
        (m, true) if m < 30.0 => "slightly left",
        (m, false) if m < 30.0 => "slightly right",
        (m, true) if m < 90.0 => "to your left",
        (m, false) if m < 90.0 => "to your right",
        (_, true) => "behind you on the left",
        (_, false) => "behind you on the right",
    }
}

fn identity(candidate: &CandidateView) -> String {
    let mut text = candidate
        .detected_description
        .clone()
        .unwrap_or_else(|| candidate.label.clone());
    if let Some(plate) = &candidate.ocr_text {
        text.push_str(", plate ");
        text.push_str(plate);
    }
    text
}

/// The priority phrase for a candidate's status, if that status is spoken.
pub fn status_phrase(candidate: &CandidateView) -> Option<String> {
    let direction = direction_words(candidate.degrees);
    match candidate.status {
        MatchStatus::Full => Some(format!("Found it: {}, {}", identity(candidate), direction)),
        MatchStatus::Partial => Some(format!("Possible match: {}, {}", identity(candidate), direction)),
        MatchStatus::Rejected => {
            let why = candidate.reject_reason.map(reject_words).unwrap_or("no match");
            Some(format!("Not this {}: {}", candidate.label, why))
        }
        MatchStatus::Lost => Some(format!("Lost sight of the {}, last seen {}", candidate.label, direction)),
        _ => None,
    }
}

pub fn waiting_phrase(candidate: &CandidateView) -> String {
    format!("Checking the {} {}", candidate.label, direction_words(candidate.degrees))
}

/// Guidance for a retryable reason; `None` for hard rejections.
pub fn retry_phrase(reason: RejectReason) -> Option<&'static str> {
    let phrase = match reason {
        RejectReason::BlurryImage => "Image too blurry, hold the camera steady",
        RejectReason::InsufficientInfo => "Need a better look, move a little closer",
        RejectReason::LicensePlateNotVisible => "Plate not visible, try another angle",
        RejectReason::LowConfidence => "Not sure yet, keep pointing at it",
        RejectReason::Network => "Connection problem, trying again",
        RejectReason::Unspecified => "Checking again",
        RejectReason::WrongObjectClass
        | RejectReason::DescriptionMismatch
        | RejectReason::LicensePlateMismatch => return None,
    };
    Some(phrase)
}

fn reject_words(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::WrongObjectClass => "wrong kind of object",
        RejectReason::DescriptionMismatch => "does not match the description",
        RejectReason::LicensePlateMismatch => "different plate",
        RejectReason::BlurryImage => "image too blurry",
        RejectReason::InsufficientInfo => "not enough visible",
        RejectReason::LicensePlateNotVisible => "plate not visible",
        RejectReason::LowConfidence => "not sure",
        RejectReason::Network => "could not check",
        RejectReason::Unspecified => "no match",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateId;
    use crate::geometry::Rect;

    fn view(status: MatchStatus) -> CandidateView {
        CandidateView {
            id: CandidateId(1),
            label: "car".into(),
            bbox: Rect::new(0.4, 0.4, 0.1, 0.1),
            status,
            reject_reason: None,
            ocr_text: None,
            detected_description: None,
            anchor_id: None,
            degrees: 0.0,
        }
    }

    #[test]
    fn directions() {
        assert_eq!(direction_words(0.0), "straight ahead");
        assert_eq!(direction_words(-15.0), "slightly left");
        assert_eq!(direction_words(45.0), "to your right");
        assert_eq!(direction_words(-120.0), "behind you on the left");
    }

    #[test]
    fn full_phrase_mentions_plate() {
        let mut c = view(MatchStatus::Full);
        c.ocr_text = Some("ABC1234".into());
        let phrase = status_phrase(&c).unwrap();
        assert!(phrase.contains("ABC1234"));
        assert!(phrase.contains("straight ahead"));
    }

    #[test]
    fn description_replaces_label() {
        let mut c = view(MatchStatus::Partial);
        c.detected_description = Some("blue hatchback".into());
        assert_eq!(status_phrase(&c).unwrap(), "Possible match: blue hatchback, straight ahead");
    }

    #[test]
    fn silent_statuses() {
        assert!(status_phrase(&view(MatchStatus::Unknown)).is_none());
        assert!(status_phrase(&view(MatchStatus::Waiting)).is_none());
        assert!(status_phrase(&view(MatchStatus::Expired)).is_none());
    }

    #[test]
    fn hard_rejections_have_no_retry_phrase() {
        assert!(retry_phrase(RejectReason::DescriptionMismatch).is_none());
        assert!(retry_phrase(RejectReason::BlurryImage).is_some());
    }
}
