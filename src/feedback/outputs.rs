//! Platform feedback sinks.

use std::time::Duration;

/// Text-to-speech.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, phrase: &str);
}

/// A periodic pulse: an audible tone or a haptic tap.
///
/// Implementations own their timer. `update_interval` with `smooth` set
/// retunes a running pulse without restarting it.
pub trait PulseOutput: Send + Sync {
    fn start_pulsing(&self, interval: Duration);
    fn update_interval(&self, interval: Duration, smooth: bool);
    fn stop_pulsing(&self);
}
