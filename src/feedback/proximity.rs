//! Continuous tone and haptic feedback from horizontal centering.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::candidate::MatchStatus;
use crate::config::ProximityConfig;
use crate::diagnostics::Diagnostics;
use crate::error::ConfigError;
use crate::feedback::outputs::PulseOutput;
use crate::geometry::Rect;
use crate::pipeline::PresentationSnapshot;

/// Largest possible centering score: a box midpoint on the frame edge.
const MAX_SCORE: f32 = 0.5;

/// Distance of the box's horizontal midpoint from the frame center, in `[0, 0.5]`.
pub fn centering_score(bbox: &Rect) -> f32 {
    (bbox.mid_x() - 0.5).abs().min(MAX_SCORE)
}

/// One row of a stepped mapping: scores up to `max_score` pulse every `interval_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalStep {
    pub max_score: f32,
    pub interval_ms: u64,
}

/// Centering score to pulse interval.
///
/// ```toml
/// [proximity.mapping]
/// kind = "stepped"
/// fallback_interval_ms = 1000
/// steps = [
///     { max_score = 0.05, interval_ms = 100 },
///     { max_score = 0.2, interval_ms = 300 },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalMapping {
    /// `min_interval_ms` when centered, growing linearly to `max_interval_ms`
    /// at the frame edge.
    Linear { min_interval_ms: u64, max_interval_ms: u64 },
    /// First step whose `max_score` covers the score; `fallback_interval_ms`
    /// beyond the last step.
    Stepped {
        steps: Vec<IntervalStep>,
        fallback_interval_ms: u64,
    },
}

impl Default for IntervalMapping {
    fn default() -> Self {
        IntervalMapping::Linear {
            min_interval_ms: 100,
            max_interval_ms: 1_000,
        }
    }
}

impl IntervalMapping {
    /// A non-finite score counts as fully off-center.
    pub fn interval(&self, score: f32) -> Duration {
        let score = if score.is_finite() {
            score.clamp(0.0, MAX_SCORE)
        } else {
            MAX_SCORE
        };
        match self {
            IntervalMapping::Linear {
                min_interval_ms,
                max_interval_ms,
            } => {
                let span = max_interval_ms.saturating_sub(*min_interval_ms) as f32;
                let ms = *min_interval_ms as f32 + span * (score / MAX_SCORE);
                Duration::from_millis(ms.round() as u64)
            }
            IntervalMapping::Stepped {
                steps,
                fallback_interval_ms,
            } => {
                let ms = steps
                    .iter()
                    .find(|step| score <= step.max_score)
                    .map_or(*fallback_interval_ms, |step| step.interval_ms);
                Duration::from_millis(ms)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                field: "proximity.mapping",
                reason: reason.to_string(),
            })
        };
        match self {
            IntervalMapping::Linear {
                min_interval_ms,
                max_interval_ms,
            } => {
                if *min_interval_ms == 0 {
                    return invalid("min_interval_ms must be positive");
                }
                if min_interval_ms > max_interval_ms {
                    return invalid("min_interval_ms must not exceed max_interval_ms");
                }
            }
            IntervalMapping::Stepped {
                steps,
                fallback_interval_ms,
            } => {
                if steps.is_empty() {
                    return invalid("stepped mapping needs at least one step");
                }
                if *fallback_interval_ms == 0 || steps.iter().any(|s| s.interval_ms == 0) {
                    return invalid("intervals must be positive");
                }
                if steps.iter().any(|s| !s.max_score.is_finite()) {
                    return invalid("step scores must be finite");
                }
                if steps.windows(2).any(|w| w[0].max_score >= w[1].max_score) {
                    return invalid("steps must be sorted by increasing max_score");
                }
            }
        }
        Ok(())
    }
}

/// Box of the best candidate to guide toward: the first `Full` match, else
/// the first `Partial` one.
pub fn best_target(snapshot: &PresentationSnapshot) -> Option<Rect> {
    snapshot
        .with_status(MatchStatus::Full)
        .chain(snapshot.with_status(MatchStatus::Partial))
        .next()
        .map(|c| c.bbox)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Pulsing(Duration),
}

/// One pulse output with its own idle/pulsing state.
pub struct PulseChannel {
    output: Arc<dyn PulseOutput>,
    enabled: bool,
    state: ChannelState,
}

impl PulseChannel {
    pub fn new(output: Arc<dyn PulseOutput>, enabled: bool) -> Self {
        Self {
            output,
            enabled,
            state: ChannelState::Idle,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Start, retune or stop the pulse for `interval`.
    fn drive(&mut self, interval: Option<Duration>) {
        let wanted = interval.filter(|_| self.enabled);
        self.state = match (wanted, self.state) {
            (Some(interval), ChannelState::Idle) => {
                self.output.start_pulsing(interval);
                ChannelState::Pulsing(interval)
            }
            (Some(interval), ChannelState::Pulsing(current)) => {
                if interval != current {
                    self.output.update_interval(interval, true);
                }
                ChannelState::Pulsing(interval)
            }
            (None, ChannelState::Pulsing(_)) => {
                self.output.stop_pulsing();
                ChannelState::Idle
            }
            (None, ChannelState::Idle) => ChannelState::Idle,
        };
    }
}

/// Drives the tone and haptic channels from the target's centering.
pub struct ProximityController {
    mapping: IntervalMapping,
    tone: PulseChannel,
    haptic: PulseChannel,
    diag: Diagnostics,
}

impl ProximityController {
    pub fn new(
        config: &ProximityConfig,
        tone: Arc<dyn PulseOutput>,
        haptic: Arc<dyn PulseOutput>,
        diag: Diagnostics,
    ) -> Self {
        Self {
            mapping: config.mapping.clone(),
            tone: PulseChannel::new(tone, config.enable_beeps),
            haptic: PulseChannel::new(haptic, config.enable_haptics),
            diag,
        }
    }

    pub fn tone(&self) -> &PulseChannel {
        &self.tone
    }

    pub fn haptic(&self) -> &PulseChannel {
        &self.haptic
    }

    pub fn set_beeps_enabled(&mut self, enabled: bool) {
        self.tone.set_enabled(enabled);
    }

    pub fn set_haptics_enabled(&mut self, enabled: bool) {
        self.haptic.set_enabled(enabled);
    }

    /// Update both channels for `target`; returns the interval in effect.
    pub fn tick(&mut self, target: Option<Rect>) -> Option<Duration> {
        let _enter = self.diag.span().enter();
        let interval = target.map(|bbox| self.mapping.interval(centering_score(&bbox)));
        trace!(?interval, "proximity tick");
        self.tone.drive(interval);
        self.haptic.drive(interval);
        interval
    }

    /// Silence both channels.
    pub fn stop(&mut self) {
        self.tone.drive(None);
        self.haptic.drive(None);
    }
}
