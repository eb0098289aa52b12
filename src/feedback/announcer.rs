//! De-duplicated, cooldown-gated spoken announcements.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::candidate::{CandidateId, MatchStatus, RejectReason};
use crate::config::AnnouncerConfig;
use crate::diagnostics::Diagnostics;
use crate::feedback::outputs::SpeechOutput;
use crate::feedback::phrases::{retry_phrase, status_phrase, waiting_phrase};
use crate::pipeline::{CandidateView, PresentationSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Status(MatchStatus),
    Retry(RejectReason),
    Waiting,
}

#[derive(Debug, Clone)]
struct Announcement {
    id: CandidateId,
    phrase: String,
    kind: Kind,
}

#[derive(Debug, Default)]
struct CandidateMemory {
    /// Status of the last status phrase spoken for this candidate.
    last_status: Option<MatchStatus>,
    phrases: HashMap<String, Instant>,
    last_waiting: Option<Instant>,
    last_retry: Option<Instant>,
    retry_reasons: HashSet<RejectReason>,
    last_direction: Option<Instant>,
    /// Last lost phrase spoken; a repeat must name a different direction.
    lost_phrase: Option<String>,
}

fn elapsed(since: Option<Instant>, now: Instant, window: Duration) -> bool {
    since.is_none_or(|t| now.saturating_duration_since(t) >= window)
}

/// Turns snapshots into at most one spoken phrase per tick.
///
/// Candidates are considered in this order:
///
/// 1. the best `Full` > `Partial` > `Rejected` (if enabled) candidate whose
///    status changed since it was last announced;
/// 2. a previously announced candidate that became `Lost`, repeated at most
///    every `direction_change_interval` and only when its direction words
///    changed. Lost candidates that already left the store are still
///    reported through [`PresentationSnapshot::lost`];
/// 3. retry guidance, once per reason per candidate;
/// 4. a "checking" phrase for candidates being verified.
///
/// Every phrase must also clear the global and per-candidate repeat windows.
/// The gates are independent; any one of them vetoes.
pub struct NavigationAnnouncer {
    config: AnnouncerConfig,
    speech: Arc<dyn SpeechOutput>,
    memory: HashMap<CandidateId, CandidateMemory>,
    recent: HashMap<String, Instant>,
    diag: Diagnostics,
}

impl NavigationAnnouncer {
    pub fn new(config: &AnnouncerConfig, speech: Arc<dyn SpeechOutput>, diag: Diagnostics) -> Self {
        Self {
            config: config.clone(),
            speech,
            memory: HashMap::new(),
            recent: HashMap::new(),
            diag,
        }
    }

    /// Toggle speech at runtime. While disabled, phrases are still chosen
    /// and remembered, just not spoken.
    pub fn set_speech_enabled(&mut self, enabled: bool) {
        self.config.enable_speech = enabled;
    }

    pub fn tick(&mut self, snapshot: &PresentationSnapshot, now: Instant) -> Option<String> {
        let span = self.diag.span().clone();
        let _enter = span.enter();

        self.refresh_memory(snapshot, now);

        let announcement = self
            .priority_announcement(snapshot, now)
            .or_else(|| self.lost_announcement(snapshot, now))
            .or_else(|| self.retry_announcement(snapshot, now))
            .or_else(|| self.waiting_announcement(snapshot, now))?;
        self.commit(&announcement, now);

        if !self.config.enable_speech {
            debug!(candidate = %announcement.id, phrase = %announcement.phrase, "speech disabled");
            return None;
        }
        info!(candidate = %announcement.id, phrase = %announcement.phrase, "announcing");
        self.speech.speak(&announcement.phrase);
        Some(announcement.phrase)
    }

    fn refresh_memory(&mut self, snapshot: &PresentationSnapshot, now: Instant) {
        self.memory.retain(|id, _| {
            snapshot.get(*id).is_some() || snapshot.lost.iter().any(|c| c.id == *id)
        });

        let window = self.config.speech_repeat_interval();
        self.recent
            .retain(|_, at| now.saturating_duration_since(*at) < window);

        for candidate in &snapshot.candidates {
            let memory = self.memory.entry(candidate.id).or_default();
            memory
                .phrases
                .retain(|_, at| now.saturating_duration_since(*at) < window);

            let hard_rejected = candidate.status == MatchStatus::Rejected
                && candidate.reject_reason.is_some_and(|r| !r.is_retryable());
            if candidate.status == MatchStatus::Full || hard_rejected {
                memory.retry_reasons.clear();
            }
        }
    }

    fn phrase_allowed(&self, id: CandidateId, phrase: &str, now: Instant) -> bool {
        let window = self.config.speech_repeat_interval();
        let globally = elapsed(self.recent.get(phrase).copied(), now, window);
        let locally = elapsed(
            self.memory
                .get(&id)
                .and_then(|m| m.phrases.get(phrase).copied()),
            now,
            window,
        );
        globally && locally
    }

    fn announces(&self, status: MatchStatus) -> bool {
        match status {
            MatchStatus::Full | MatchStatus::Partial => true,
            MatchStatus::Rejected => self.config.announce_rejected,
            _ => false,
        }
    }

    fn priority_announcement(&self, snapshot: &PresentationSnapshot, now: Instant) -> Option<Announcement> {
        let top = snapshot
            .candidates
            .iter()
            .filter(|c| self.announces(c.status))
            .map(|c| c.status.priority())
            .max()?;

        snapshot
            .candidates
            .iter()
            .filter(|c| self.announces(c.status) && c.status.priority() == top)
            .find_map(|c| {
                let last = self.memory.get(&c.id).and_then(|m| m.last_status);
                if last == Some(c.status) {
                    return None;
                }
                self.status_announcement(c, now)
            })
    }

    fn lost_announcement(&self, snapshot: &PresentationSnapshot, now: Instant) -> Option<Announcement> {
        snapshot.lost_candidates().find_map(|c| {
            let memory = self.memory.get(&c.id)?;
            let repeat = memory.last_status? == MatchStatus::Lost;
            if repeat && !elapsed(memory.last_direction, now, self.config.direction_change_interval()) {
                return None;
            }
            let announcement = self.status_announcement(c, now)?;
            if repeat && memory.lost_phrase.as_deref() == Some(announcement.phrase.as_str()) {
                return None;
            }
            Some(announcement)
        })
    }

    fn status_announcement(&self, c: &CandidateView, now: Instant) -> Option<Announcement> {
        let phrase = status_phrase(c)?;
        self.phrase_allowed(c.id, &phrase, now).then(|| Announcement {
            id: c.id,
            phrase,
            kind: Kind::Status(c.status),
        })
    }

    fn retry_announcement(&self, snapshot: &PresentationSnapshot, now: Instant) -> Option<Announcement> {
        if !self.config.announce_retry_messages {
            return None;
        }
        snapshot
            .candidates
            .iter()
            .filter(|c| matches!(c.status, MatchStatus::Unknown | MatchStatus::Rejected))
            .find_map(|c| {
                let reason = c.reject_reason.filter(|r| r.is_retryable())?;
                let phrase = retry_phrase(reason)?;
                let memory = self.memory.get(&c.id);
                if memory.is_some_and(|m| m.retry_reasons.contains(&reason)) {
                    return None;
                }
                if !elapsed(
                    memory.and_then(|m| m.last_retry),
                    now,
                    self.config.retry_phrase_cooldown(),
                ) {
                    return None;
                }
                self.phrase_allowed(c.id, phrase, now).then(|| Announcement {
                    id: c.id,
                    phrase: phrase.to_string(),
                    kind: Kind::Retry(reason),
                })
            })
    }

    fn waiting_announcement(&self, snapshot: &PresentationSnapshot, now: Instant) -> Option<Announcement> {
        if !self.config.announce_waiting_messages {
            return None;
        }
        snapshot.with_status(MatchStatus::Waiting).find_map(|c| {
            let last = self.memory.get(&c.id).and_then(|m| m.last_waiting);
            if !elapsed(last, now, self.config.waiting_phrase_cooldown()) {
                return None;
            }
            let phrase = waiting_phrase(c);
            self.phrase_allowed(c.id, &phrase, now).then(|| Announcement {
                id: c.id,
                phrase,
                kind: Kind::Waiting,
            })
        })
    }

    fn commit(&mut self, announcement: &Announcement, now: Instant) {
        self.recent.insert(announcement.phrase.clone(), now);
        let memory = self.memory.entry(announcement.id).or_default();
        memory.phrases.insert(announcement.phrase.clone(), now);
        match announcement.kind {
            Kind::Status(status) => {
                if status == MatchStatus::Lost {
                    memory.last_direction = Some(now);
                    memory.lost_phrase = Some(announcement.phrase.clone());
                }
                memory.last_status = Some(status);
            }
            Kind::Retry(reason) => {
                memory.retry_reasons.insert(reason);
                memory.last_retry = Some(now);
            }
            Kind::Waiting => memory.last_waiting = Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::geometry::Rect;

    #[derive(Default)]
    struct RecordingSpeech {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechOutput for RecordingSpeech {
        fn speak(&self, phrase: &str) {
            self.spoken.lock().unwrap().push(phrase.to_string());
        }
    }

    fn view(id: u64, status: MatchStatus) -> CandidateView {
        CandidateView {
            id: CandidateId(id),
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

    fn snapshot(candidates: Vec<CandidateView>) -> PresentationSnapshot {
        PresentationSnapshot {
            frame_index: 1,
            candidates,
            lost: vec![],
        }
    }

    fn announcer(config: AnnouncerConfig) -> (NavigationAnnouncer, Arc<RecordingSpeech>) {
        let speech = Arc::new(RecordingSpeech::default());
        let announcer = NavigationAnnouncer::new(&config, speech.clone(), Diagnostics::disabled());
        (announcer, speech)
    }

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn full_match_is_announced_once() {
        let (mut announcer, speech) = announcer(AnnouncerConfig::default());
        let mut full = view(1, MatchStatus::Full);
        full.ocr_text = Some("ABC1234".into());
        let snap = snapshot(vec![full]);
        let t0 = Instant::now();

        let phrase = announcer.tick(&snap, t0).unwrap();
        assert!(phrase.contains("ABC1234"));
        assert!(announcer.tick(&snap, t0 + secs(1.0)).is_none());
        assert!(announcer.tick(&snap, t0 + secs(60.0)).is_none());
        assert_eq!(speech.spoken.lock().unwrap().len(), 1);
    }

    #[test]
    fn full_takes_priority_over_partial() {
        let (mut announcer, speech) = announcer(AnnouncerConfig::default());
        let mut full = view(2, MatchStatus::Full);
        full.ocr_text = Some("XYZ".into());
        let snap = snapshot(vec![view(1, MatchStatus::Partial), full]);
        let t0 = Instant::now();

        assert!(announcer.tick(&snap, t0).unwrap().contains("XYZ"));
        // The partial candidate stays quiet while a full match is present.
        assert!(announcer.tick(&snap, t0 + secs(10.0)).is_none());
        assert_eq!(speech.spoken.lock().unwrap().len(), 1);
    }

    #[test]
    fn rejected_needs_opt_in() {
        let mut rejected = view(1, MatchStatus::Rejected);
        rejected.reject_reason = Some(RejectReason::DescriptionMismatch);
        let snap = snapshot(vec![rejected]);

        let (mut quiet, _) = announcer(AnnouncerConfig::default());
        assert!(quiet.tick(&snap, Instant::now()).is_none());

        let (mut chatty, _) = announcer(AnnouncerConfig {
            announce_rejected: true,
            ..AnnouncerConfig::default()
        });
        assert!(chatty.tick(&snap, Instant::now()).unwrap().starts_with("Not this car"));
    }

    #[test]
    fn identical_phrase_is_suppressed_globally() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let snap = snapshot(vec![view(1, MatchStatus::Partial), view(2, MatchStatus::Partial)]);
        let t0 = Instant::now();

        assert!(announcer.tick(&snap, t0).is_some());
        // Candidate 2 would say the same words.
        assert!(announcer.tick(&snap, t0 + secs(1.0)).is_none());
        assert!(announcer.tick(&snap, t0 + secs(5.0)).is_some());
    }

    #[test]
    fn status_change_within_window_keeps_phrase_suppressed() {
        let (mut announcer, _) = announcer(AnnouncerConfig {
            announce_rejected: true,
            ..AnnouncerConfig::default()
        });
        let t0 = Instant::now();
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Partial)]), t0).is_some());

        let mut rejected = view(1, MatchStatus::Rejected);
        rejected.reject_reason = Some(RejectReason::LowConfidence);
        let first = announcer.tick(&snapshot(vec![rejected]), t0 + secs(0.5));
        assert!(first.unwrap().starts_with("Not this car"));

        // Back to partial within the repeat window: same words, vetoed.
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Partial)]), t0 + secs(1.0)).is_none());
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Partial)]), t0 + secs(5.0)).is_some());
    }

    #[test]
    fn waiting_phrase_has_its_own_cooldown() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let snap = snapshot(vec![view(1, MatchStatus::Waiting)]);
        let t0 = Instant::now();

        assert_eq!(announcer.tick(&snap, t0).unwrap(), "Checking the car straight ahead");
        // Past the repeat window but inside the waiting cooldown.
        assert!(announcer.tick(&snap, t0 + secs(5.0)).is_none());
        assert!(announcer.tick(&snap, t0 + secs(9.0)).is_some());
    }

    #[test]
    fn waiting_messages_can_be_disabled() {
        let (mut announcer, _) = announcer(AnnouncerConfig {
            announce_waiting_messages: false,
            ..AnnouncerConfig::default()
        });
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Waiting)]), Instant::now()).is_none());
    }

    #[test]
    fn retry_phrase_once_per_reason_until_cleared() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let mut blurry = view(1, MatchStatus::Unknown);
        blurry.reject_reason = Some(RejectReason::BlurryImage);
        let t0 = Instant::now();

        let phrase = announcer.tick(&snapshot(vec![blurry.clone()]), t0).unwrap();
        assert!(phrase.contains("blurry"));
        assert!(announcer.tick(&snapshot(vec![blurry.clone()]), t0 + secs(20.0)).is_none());

        let mut network = blurry.clone();
        network.reject_reason = Some(RejectReason::Network);
        assert!(announcer.tick(&snapshot(vec![network]), t0 + secs(21.0)).is_some());

        // A hard rejection clears retry memory.
        let mut hard = view(1, MatchStatus::Rejected);
        hard.reject_reason = Some(RejectReason::DescriptionMismatch);
        assert!(announcer.tick(&snapshot(vec![hard]), t0 + secs(30.0)).is_none());
        assert!(announcer.tick(&snapshot(vec![blurry]), t0 + secs(40.0)).is_some());
    }

    #[test]
    fn retry_phrases_respect_cooldown() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let mut blurry = view(1, MatchStatus::Unknown);
        blurry.reject_reason = Some(RejectReason::BlurryImage);
        let t0 = Instant::now();
        assert!(announcer.tick(&snapshot(vec![blurry.clone()]), t0).is_some());

        let mut network = blurry;
        network.reject_reason = Some(RejectReason::Network);
        assert!(announcer.tick(&snapshot(vec![network.clone()]), t0 + secs(1.0)).is_none());
        assert!(announcer.tick(&snapshot(vec![network]), t0 + secs(7.0)).is_some());
    }

    #[test]
    fn lost_candidate_repeats_with_new_direction() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let t0 = Instant::now();
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Full)]), t0).is_some());

        let mut lost = view(1, MatchStatus::Lost);
        lost.degrees = -45.0;
        let phrase = announcer.tick(&snapshot(vec![lost.clone()]), t0 + secs(1.0)).unwrap();
        assert!(phrase.ends_with("to your left"));

        lost.degrees = -20.0;
        assert!(announcer.tick(&snapshot(vec![lost.clone()]), t0 + secs(2.0)).is_none());
        let phrase = announcer.tick(&snapshot(vec![lost]), t0 + secs(4.5)).unwrap();
        assert!(phrase.ends_with("slightly left"));
    }

    #[test]
    fn lost_repeat_needs_a_new_direction() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let t0 = Instant::now();
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Full)]), t0).is_some());
        let lost = snapshot(vec![view(1, MatchStatus::Lost)]);
        assert!(announcer.tick(&lost, t0 + secs(1.0)).is_some());
        // Well past both windows, but still straight ahead.
        assert!(announcer.tick(&lost, t0 + secs(20.0)).is_none());
    }

    #[test]
    fn lingering_lost_entry_keeps_its_memory() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let t0 = Instant::now();
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Full)]), t0).is_some());
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Lost)]), t0 + secs(1.0)).is_some());

        let mut gone = view(1, MatchStatus::Lost);
        gone.degrees = 50.0;
        let lingering = PresentationSnapshot {
            lost: vec![gone],
            ..snapshot(vec![])
        };
        assert!(announcer.tick(&lingering, t0 + secs(2.0)).is_none());
        let phrase = announcer.tick(&lingering, t0 + secs(4.5)).unwrap();
        assert_eq!(phrase, "Lost sight of the car, last seen to your right");

        // Once the entry stops lingering the candidate is forgotten.
        assert!(announcer.tick(&snapshot(vec![]), t0 + secs(5.0)).is_none());
        assert!(announcer.memory.is_empty());
    }

    #[test]
    fn unannounced_lost_candidate_is_silent() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        assert!(announcer.tick(&snapshot(vec![view(1, MatchStatus::Lost)]), Instant::now()).is_none());
    }

    #[test]
    fn vanished_candidates_are_forgotten() {
        let (mut announcer, _) = announcer(AnnouncerConfig::default());
        let snap = snapshot(vec![view(1, MatchStatus::Full)]);
        let t0 = Instant::now();
        assert!(announcer.tick(&snap, t0).is_some());
        assert!(announcer.tick(&snapshot(vec![]), t0 + secs(1.0)).is_none());
        assert!(announcer.tick(&snap, t0 + secs(5.0)).is_some());
    }

    #[test]
    fn disabled_speech_still_advances_state() {
        let (mut announcer, speech) = announcer(AnnouncerConfig {
            enable_speech: false,
            ..AnnouncerConfig::default()
        });
        let snap = snapshot(vec![view(1, MatchStatus::Full)]);
        let t0 = Instant::now();
        assert!(announcer.tick(&snap, t0).is_none());

        announcer.set_speech_enabled(true);
        assert!(announcer.tick(&snap, t0 + secs(10.0)).is_none());
        assert!(speech.spoken.lock().unwrap().is_empty());
    }
}
