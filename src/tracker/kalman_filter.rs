//! Constant-velocity Kalman filter over (cx, cy, aspect, h) box state.
//!
//! State is the measured box plus its per-frame velocity. Noise scales with
//! box height so small, distant objects are not over-trusted.

use nalgebra::{SMatrix, SVector};

pub type BoxState = SVector<f64, 8>;
pub type BoxCovariance = SMatrix<f64, 8, 8>;
pub type BoxMeasurement = SVector<f64, 4>;

const POSITION_WEIGHT: f64 = 1.0 / 20.0;
const VELOCITY_WEIGHT: f64 = 1.0 / 160.0;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    transition: BoxCovariance,
    observation: SMatrix<f64, 4, 8>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        // x' = x + v for each of the four box components.
        let transition = BoxCovariance::from_fn(|r, c| {
            if r == c || c == r + 4 { 1.0 } else { 0.0 }
        });
        let observation = SMatrix::<f64, 4, 8>::from_fn(|r, c| if r == c { 1.0 } else { 0.0 });
        Self {
            transition,
            observation,
        }
    }

    /// Start a track at `z` with zero velocity and wide uncertainty.
    pub fn initiate(&self, z: BoxMeasurement) -> (BoxState, BoxCovariance) {
        let h = z[3];
        let pos = 2.0 * POSITION_WEIGHT * h;
        let vel = 10.0 * VELOCITY_WEIGHT * h;
        let state = BoxState::from_fn(|i, _| if i < 4 { z[i] } else { 0.0 });
        let spread = [pos, pos, 1e-2, pos, vel, vel, 1e-5, vel];
        (state, variance(&spread))
    }

    pub fn predict(&self, state: &BoxState, cov: &BoxCovariance) -> (BoxState, BoxCovariance) {
        let h = state[3];
        let pos = POSITION_WEIGHT * h;
        let vel = VELOCITY_WEIGHT * h;
        let process_noise = variance(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        let state = self.transition * state;
        let cov = self.transition * cov * self.transition.transpose() + process_noise;
        (state, cov)
    }

    /// Fold `z` into the state. `None` when the innovation covariance is
    /// singular; callers re-initiate from the measurement.
    pub fn update(
        &self,
        state: &BoxState,
        cov: &BoxCovariance,
        z: BoxMeasurement,
    ) -> Option<(BoxState, BoxCovariance)> {
        let h = state[3];
        let pos = POSITION_WEIGHT * h;
        let measurement_noise = SMatrix::<f64, 4, 4>::from_diagonal(&SVector::from([
            pos * pos,
            pos * pos,
            1e-2,
            pos * pos,
        ]));

        let h_t = self.observation.transpose();
        let innovation_cov = self.observation * cov * h_t + measurement_noise;
        let gain = cov * h_t * innovation_cov.try_inverse()?;
        let residual = z - self.observation * state;

        let state = state + gain * residual;
        let cov = cov - gain * innovation_cov * gain.transpose();
        Some((state, cov))
    }
}

fn variance(spread: &[f64; 8]) -> BoxCovariance {
    BoxCovariance::from_diagonal(&BoxState::from_fn(|i, _| spread[i] * spread[i]))
}
