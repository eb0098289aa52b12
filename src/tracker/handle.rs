//! Per-candidate tracking handle and its retirement lifecycle.

use crate::geometry::Rect;
use crate::tracker::kalman_filter::{BoxCovariance, BoxMeasurement, BoxState, KalmanFilter};

/// Lifecycle of a tracking handle.
///
/// A handle that fails is not dropped immediately: the tracking primitive
/// needs one more evaluation to release its resources, so the handle goes
/// `Active -> Retiring -> Reaped` across two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlePhase {
    #[default]
    Active,
    /// Advance exactly once more, then reap.
    Retiring,
    /// Released; the candidate is removed from the store.
    Reaped,
}

#[derive(Debug)]
pub(crate) struct TrackingHandle<S> {
    pub state: S,
    pub phase: HandlePhase,
    pub smoother: Option<BoxSmoother>,
}

impl<S> TrackingHandle<S> {
    pub fn new(state: S, smoother: Option<BoxSmoother>) -> Self {
        Self {
            state,
            phase: HandlePhase::Active,
            smoother,
        }
    }

    /// Mark for retirement. Returns `false` if already retiring or reaped.
    pub fn retire(&mut self) -> bool {
        if self.phase != HandlePhase::Active {
            return false;
        }
        self.phase = HandlePhase::Retiring;
        true
    }
}

/// Kalman smoothing of a handle's box so downstream feedback does not
/// jitter with per-frame measurement noise.
#[derive(Debug, Clone)]
pub(crate) struct BoxSmoother {
    mean: BoxState,
    covariance: BoxCovariance,
}

impl BoxSmoother {
    pub fn new(kalman_filter: &KalmanFilter, bbox: Rect) -> Self {
        let (mean, covariance) = kalman_filter.initiate(to_measurement(&bbox));
        Self { mean, covariance }
    }

    /// Predict forward one frame, fold in `bbox`, and return the smoothed box.
    pub fn step(&mut self, kalman_filter: &KalmanFilter, bbox: Rect) -> Rect {
        let measurement = to_measurement(&bbox);
        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        match kalman_filter.update(&mean, &covariance, measurement) {
            Some((mean, covariance)) => {
                self.mean = mean;
                self.covariance = covariance;
            }
            None => {
                let (mean, covariance) = kalman_filter.initiate(measurement);
                self.mean = mean;
                self.covariance = covariance;
            }
        }
        Rect::from_xyah(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
        .clamped()
    }
}

fn to_measurement(bbox: &Rect) -> BoxMeasurement {
    let [cx, cy, aspect, h] = bbox.to_xyah();
    BoxMeasurement::new(cx as f64, cy as f64, aspect as f64, h as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retire_is_one_way() {
        let mut handle = TrackingHandle::new((), None);
        assert!(handle.retire());
        assert_eq!(handle.phase, HandlePhase::Retiring);
        assert!(!handle.retire());
    }

    #[test]
    fn smoother_stays_in_unit_square() {
        let kf = KalmanFilter::new();
        let mut smoother = BoxSmoother::new(&kf, Rect::new(0.85, 0.4, 0.1, 0.1));
        let mut out = Rect::default();
        for step in 0..10 {
            let x = 0.85 + 0.02 * step as f32;
            out = smoother.step(&kf, Rect::new(x.min(0.9), 0.4, 0.1, 0.1));
        }
        let [x1, y1, x2, y2] = out.to_tlbr();
        assert!(x1 >= 0.0 && y1 >= 0.0 && x2 <= 1.0 && y2 <= 1.0);
    }

    #[test]
    fn smoother_follows_steady_box() {
        let kf = KalmanFilter::new();
        let bbox = Rect::new(0.3, 0.3, 0.2, 0.2);
        let mut smoother = BoxSmoother::new(&kf, bbox);
        let out = smoother.step(&kf, bbox);
        assert!(out.iou(&bbox) > 0.95);
    }
}
