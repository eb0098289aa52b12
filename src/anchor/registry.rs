//! Bookkeeping for anchors bound to candidates.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::anchor::session::{AnchorId, WorldTransform};
use crate::candidate::CandidateId;

#[derive(Debug, Clone)]
struct Binding {
    anchor: AnchorId,
    transform: WorldTransform,
}

/// Tracks which anchor belongs to which candidate so anchored objects can be
/// re-projected relative to the camera after the viewpoint changes.
#[derive(Debug, Clone, Default)]
pub struct AnchorRegistry {
    bindings: HashMap<CandidateId, Binding>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a binding. An existing binding for `candidate` is kept.
    pub fn register(
        &mut self,
        candidate: CandidateId,
        anchor: AnchorId,
        transform: WorldTransform,
    ) -> bool {
        if self.bindings.contains_key(&candidate) {
            return false;
        }
        self.bindings.insert(candidate, Binding { anchor, transform });
        true
    }

    pub fn anchor_for(&self, candidate: CandidateId) -> Option<AnchorId> {
        self.bindings.get(&candidate).map(|b| b.anchor)
    }

    pub fn transform_for(&self, candidate: CandidateId) -> Option<&WorldTransform> {
        self.bindings.get(&candidate).map(|b| &b.transform)
    }

    /// Drop the binding of a candidate that left the store.
    pub fn forget(&mut self, candidate: CandidateId) -> Option<AnchorId> {
        self.bindings.remove(&candidate).map(|b| b.anchor)
    }

    /// Drop every binding whose candidate `keep` rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(CandidateId) -> bool) {
        self.bindings.retain(|id, _| keep(*id));
    }

    /// Horizontal bearing from the camera to the anchor, negative to the left.
    pub fn bearing_degrees(&self, candidate: CandidateId, camera: &WorldTransform) -> Option<f32> {
        self.transform_for(candidate)
            .map(|anchor| bearing_between(anchor, camera))
    }

    /// Straight-line distance from the camera to the anchor, in meters.
    pub fn distance(&self, candidate: CandidateId, camera: &WorldTransform) -> Option<f32> {
        self.transform_for(candidate)
            .map(|anchor| in_camera_frame(anchor, camera).coords.norm())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Position of `anchor` in the camera's frame (camera looks down -z).
fn in_camera_frame(anchor: &WorldTransform, camera: &WorldTransform) -> Point3<f32> {
    camera.inverse_transform_point(&Point3::from(anchor.translation.vector))
}

/// Horizontal bearing from `camera` to `anchor` in degrees, negative to the
/// left. Works on a saved pose after the binding itself is gone.
pub fn bearing_between(anchor: &WorldTransform, camera: &WorldTransform) -> f32 {
    let p = in_camera_frame(anchor, camera);
    p.x.atan2(-p.z).to_degrees()
}

#[cfg(test)]
mod tests {
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    use super::*;

    fn at(x: f32, y: f32, z: f32) -> WorldTransform {
        WorldTransform::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
    }

    #[test]
    fn register_once() {
        let mut registry = AnchorRegistry::new();
        assert!(registry.register(CandidateId(1), AnchorId(1), at(0.0, 0.0, -2.0)));
        assert!(!registry.register(CandidateId(1), AnchorId(2), at(0.0, 0.0, -3.0)));
        assert_eq!(registry.anchor_for(CandidateId(1)), Some(AnchorId(1)));
    }

    #[test]
    fn bearing_and_distance_from_camera() {
        let mut registry = AnchorRegistry::new();
        registry.register(CandidateId(1), AnchorId(1), at(2.0, 0.0, -2.0));
        let camera = at(0.0, 0.0, 0.0);

        let bearing = registry.bearing_degrees(CandidateId(1), &camera).unwrap();
        assert!((bearing - 45.0).abs() < 1e-3);
        let distance = registry.distance(CandidateId(1), &camera).unwrap();
        assert!((distance - 8f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn bearing_follows_camera_rotation() {
        let mut registry = AnchorRegistry::new();
        registry.register(CandidateId(1), AnchorId(1), at(0.0, 0.0, -5.0));
        // Camera turned 90 degrees to the left; the anchor is now on its right.
        let camera = WorldTransform::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2),
        );
        let bearing = registry.bearing_degrees(CandidateId(1), &camera).unwrap();
        assert!((bearing - 90.0).abs() < 1e-3);
    }

    #[test]
    fn saved_pose_outlives_forget() {
        let mut registry = AnchorRegistry::new();
        registry.register(CandidateId(1), AnchorId(1), at(-2.0, 0.0, -2.0));
        let saved = *registry.transform_for(CandidateId(1)).unwrap();
        registry.forget(CandidateId(1));
        assert!(registry.transform_for(CandidateId(1)).is_none());
        assert!((bearing_between(&saved, &at(0.0, 0.0, 0.0)) + 45.0).abs() < 1e-3);
    }

    #[test]
    fn forget_and_retain() {
        let mut registry = AnchorRegistry::new();
        registry.register(CandidateId(1), AnchorId(1), at(0.0, 0.0, -1.0));
        registry.register(CandidateId(2), AnchorId(2), at(0.0, 0.0, -1.0));
        assert_eq!(registry.forget(CandidateId(1)), Some(AnchorId(1)));
        registry.retain(|id| id != CandidateId(2));
        assert!(registry.is_empty());
    }
}
