use std::fmt;

use nalgebra::{Isometry3, Point2};
use serde::{Deserialize, Serialize};

/// Rigid world transform of a ray-cast hit, anchor or camera.
///
/// Camera transforms follow the usual AR convention: `-Z` forward, `+X` right.
pub type WorldTransform = Isometry3<f32>;

/// Identifier of a spatial anchor created by the AR session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anchor-{}", self.0)
    }
}

/// The platform AR session, owned by the caller and never torn down here.
///
/// Ray casts are read-only queries; anchor creation is the only write.
pub trait SpatialSession: Send + Sync {
    /// Cast a ray from a view-space point into the scene.
    fn raycast(&self, view_point: Point2<f32>) -> Option<WorldTransform>;

    /// Create a persistent anchor at `transform`.
    fn create_anchor(&self, transform: &WorldTransform) -> AnchorId;

    /// Current camera pose, when the session is tracking.
    fn camera_transform(&self) -> Option<WorldTransform>;
}
