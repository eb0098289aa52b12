//! Pipeline configuration, loaded from TOML with environment overrides.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Durations are stored in milliseconds.
//!
//! ```toml
//! [verifier]
//! target_description = "blue hatchback, plate ABC1234"
//! endpoint = "http://localhost:8000/verify"
//!
//! [announcer]
//! announce_rejected = true
//!
//! [proximity.mapping]
//! kind = "linear"
//! min_interval_ms = 120
//! max_interval_ms = 900
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::feedback::IntervalMapping;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub detector: DetectorConfig,
    pub verifier: VerifierConfig,
    pub policy: PolicyConfig,
    pub announcer: AnnouncerConfig,
    pub proximity: ProximityConfig,
}

/// Short-term tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// A tracked result below this confidence counts as a lost track.
    pub min_confidence: f32,
    /// Kalman-smooth tracked boxes before writing them to the store.
    pub smooth_boxes: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            smooth_boxes: false,
        }
    }
}

/// Detector throttling and deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Run detection on every n-th frame; tracking runs on every frame.
    pub detect_every_n_frames: u32,
    /// Class labels the detector should report.
    pub classes: Vec<String>,
    pub min_confidence: f32,
    /// A detection overlapping an existing candidate at least this much is a duplicate.
    pub iou_threshold: f32,
    /// Re-identify detections by appearance when embeddings are available.
    pub enable_reid: bool,
    /// Maximum cosine distance for an appearance re-identification.
    pub reid_max_distance: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detect_every_n_frames: 10,
            classes: vec!["car".to_string()],
            min_confidence: 0.5,
            iou_threshold: 0.3,
            enable_reid: true,
            reid_max_distance: 0.15,
        }
    }
}

/// Remote verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Free-text description of the object the user is looking for.
    pub target_description: String,
    /// HTTP endpoint for [`HttpOracle`](crate::verify::HttpOracle).
    pub endpoint: Option<String>,
    pub request_timeout_ms: u64,
    /// Minimum time between two submissions for the same candidate.
    pub min_resubmit_interval_ms: u64,
    /// Fraction of the box size added on every side of the crop.
    pub crop_padding: f32,
    pub jpeg_quality: u8,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            target_description: String::new(),
            endpoint: None,
            request_timeout_ms: 10_000,
            min_resubmit_interval_ms: 1_000,
            crop_padding: 0.1,
            jpeg_quality: 80,
        }
    }
}

impl VerifierConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn min_resubmit_interval(&self) -> Duration {
        Duration::from_millis(self.min_resubmit_interval_ms)
    }
}

/// Coordinator housekeeping: retry cooldown, expiration and bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Wait before a retryable rejection becomes eligible again.
    pub retry_cooldown_ms: u64,
    /// Expire full/partial matches this long after they were confirmed.
    pub expire_after_ms: Option<u64>,
    /// Expire anchored matches further than this from the camera.
    pub expire_beyond_meters: Option<f32>,
    /// Camera horizontal field of view, for bearing of un-anchored candidates.
    pub horizontal_fov_degrees: f32,
    /// How long a lost candidate keeps being reported after it leaves the
    /// store, so feedback can keep pointing at where it was.
    pub lost_linger_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            retry_cooldown_ms: 3_000,
            expire_after_ms: None,
            expire_beyond_meters: None,
            horizontal_fov_degrees: 60.0,
            lost_linger_ms: 10_000,
        }
    }
}

impl PolicyConfig {
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }

    pub fn expire_after(&self) -> Option<Duration> {
        self.expire_after_ms.map(Duration::from_millis)
    }

    pub fn lost_linger(&self) -> Duration {
        Duration::from_millis(self.lost_linger_ms)
    }
}

/// Spoken announcement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    pub enable_speech: bool,
    pub announce_rejected: bool,
    pub announce_waiting_messages: bool,
    pub announce_retry_messages: bool,
    /// Do not repeat an identical phrase within this window.
    pub speech_repeat_interval_ms: u64,
    pub waiting_phrase_cooldown_ms: u64,
    pub retry_phrase_cooldown_ms: u64,
    /// Minimum gap between direction updates for a lost candidate.
    pub direction_change_interval_ms: u64,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            enable_speech: true,
            announce_rejected: false,
            announce_waiting_messages: true,
            announce_retry_messages: true,
            speech_repeat_interval_ms: 4_000,
            waiting_phrase_cooldown_ms: 8_000,
            retry_phrase_cooldown_ms: 6_000,
            direction_change_interval_ms: 3_000,
        }
    }
}

impl AnnouncerConfig {
    pub fn speech_repeat_interval(&self) -> Duration {
        Duration::from_millis(self.speech_repeat_interval_ms)
    }

    pub fn waiting_phrase_cooldown(&self) -> Duration {
        Duration::from_millis(self.waiting_phrase_cooldown_ms)
    }

    pub fn retry_phrase_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_phrase_cooldown_ms)
    }

    pub fn direction_change_interval(&self) -> Duration {
        Duration::from_millis(self.direction_change_interval_ms)
    }
}

/// Tone and haptic feedback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    pub enable_haptics: bool,
    pub enable_beeps: bool,
    pub mapping: IntervalMapping,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            enable_haptics: true,
            enable_beeps: true,
            mapping: IntervalMapping::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: PipelineConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path`, apply `SEEKTRACK_*` overrides and validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut cfg: PipelineConfig = toml::from_str(&raw)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `SEEKTRACK_*` environment variable overrides.
    ///
    /// | Variable | Config field |
    /// |---|---|
    /// | `SEEKTRACK_TARGET_DESCRIPTION` | `verifier.target_description` |
    /// | `SEEKTRACK_VERIFIER_URL` | `verifier.endpoint` |
    /// | `SEEKTRACK_ENABLE_SPEECH` | `announcer.enable_speech` |
    /// | `SEEKTRACK_ENABLE_HAPTICS` | `proximity.enable_haptics` |
    /// | `SEEKTRACK_ENABLE_BEEPS` | `proximity.enable_beeps` |
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SEEKTRACK_TARGET_DESCRIPTION") {
            self.verifier.target_description = v;
        }
        if let Some(v) = lookup("SEEKTRACK_VERIFIER_URL") {
            self.verifier.endpoint = Some(v);
        }
        if let Some(v) = lookup("SEEKTRACK_ENABLE_SPEECH")
            && let Ok(flag) = v.parse::<bool>()
        {
            self.announcer.enable_speech = flag;
        }
        if let Some(v) = lookup("SEEKTRACK_ENABLE_HAPTICS")
            && let Ok(flag) = v.parse::<bool>()
        {
            self.proximity.enable_haptics = flag;
        }
        if let Some(v) = lookup("SEEKTRACK_ENABLE_BEEPS")
            && let Ok(flag) = v.parse::<bool>()
        {
            self.proximity.enable_beeps = flag;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.detector.iou_threshold > 0.0 && self.detector.iou_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "detector.iou_threshold",
                reason: "must be in (0, 1]".into(),
            });
        }
        if self.detector.detect_every_n_frames == 0 {
            return Err(ConfigError::Invalid {
                field: "detector.detect_every_n_frames",
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.tracker.min_confidence) {
            return Err(ConfigError::Invalid {
                field: "tracker.min_confidence",
                reason: "must be in [0, 1]".into(),
            });
        }
        if self.verifier.crop_padding < 0.0 {
            return Err(ConfigError::Invalid {
                field: "verifier.crop_padding",
                reason: "must not be negative".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(ConfigError::Invalid {
                field: "detector.min_confidence",
                reason: "must be in [0, 1]".into(),
            });
        }
        let reid = self.detector.reid_max_distance;
        if reid.is_nan() || reid < 0.0 {
            return Err(ConfigError::Invalid {
                field: "detector.reid_max_distance",
                reason: "must not be negative".into(),
            });
        }
        self.proximity.mapping.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert!(cfg.announcer.enable_speech);
        assert!(!cfg.announcer.announce_rejected);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [announcer]
            announce_rejected = true
            speech_repeat_interval_ms = 1500

            [proximity.mapping]
            kind = "linear"
            min_interval_ms = 120
            max_interval_ms = 900
            "#,
        )
        .unwrap();
        assert!(cfg.announcer.announce_rejected);
        assert_eq!(cfg.announcer.speech_repeat_interval(), Duration::from_millis(1500));
        assert_eq!(cfg.announcer.waiting_phrase_cooldown_ms, 8_000);
        assert_eq!(
            cfg.proximity.mapping,
            IntervalMapping::Linear {
                min_interval_ms: 120,
                max_interval_ms: 900
            }
        );
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let err = PipelineConfig::from_toml_str("[detector]\niou_threshold = 0.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "detector.iou_threshold",
                ..
            }
        ));
    }

    #[test]
    fn detector_confidence_must_be_a_probability() {
        for raw in ["[detector]\nmin_confidence = 1.5\n", "[detector]\nmin_confidence = -0.1\n"] {
            let err = PipelineConfig::from_toml_str(raw).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    field: "detector.min_confidence",
                    ..
                }
            ));
        }
        assert!(PipelineConfig::from_toml_str("[detector]\nmin_confidence = 0.0\n").is_ok());
    }

    #[test]
    fn negative_reid_distance_is_rejected() {
        let err = PipelineConfig::from_toml_str("[detector]\nreid_max_distance = -0.2\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "detector.reid_max_distance",
                ..
            }
        ));
    }

    #[test]
    fn bad_mapping_is_reported_against_its_field() {
        let err = PipelineConfig::from_toml_str(
            "[proximity.mapping]\nkind = \"linear\"\nmin_interval_ms = 900\nmax_interval_ms = 100\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "proximity.mapping",
                ..
            }
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[verifier]\ntarget_description = \"red sedan\"").unwrap();
        let cfg = PipelineConfig::load_from(file.path()).unwrap();
        assert!(!cfg.verifier.target_description.is_empty());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PipelineConfig::load_from("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("SEEKTRACK_TARGET_DESCRIPTION", "white van"),
            ("SEEKTRACK_ENABLE_SPEECH", "false"),
            ("SEEKTRACK_ENABLE_BEEPS", "not-a-bool"),
        ]
        .into_iter()
        .collect();
        let mut cfg = PipelineConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.verifier.target_description, "white van");
        assert!(!cfg.announcer.enable_speech);
        assert!(cfg.proximity.enable_beeps);
    }
}
