//! Mapping between upright normalized image space, the raw sensor buffer and
//! the on-screen view the AR session ray casts from.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geometry::rect::Rect;

/// How the raw sensor buffer must be rotated to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Buffer is already upright.
    #[default]
    Up,
    /// Buffer is upside down.
    Down,
    /// Buffer must be rotated 90° counter-clockwise.
    Left,
    /// Buffer must be rotated 90° clockwise (typical portrait capture).
    Right,
}

impl Orientation {
    /// Whether the upright image swaps the buffer's width and height.
    pub fn is_transposed(self) -> bool {
        matches!(self, Orientation::Left | Orientation::Right)
    }

    /// Map an upright normalized point into normalized buffer coordinates.
    pub fn upright_to_buffer(self, u: f32, v: f32) -> (f32, f32) {
        match self {
            Orientation::Up => (u, v),
            Orientation::Down => (1.0 - u, 1.0 - v),
            Orientation::Right => (v, 1.0 - u),
            Orientation::Left => (1.0 - v, u),
        }
    }

    /// Map an upright normalized box into normalized buffer coordinates.
    pub fn rect_to_buffer(self, rect: &Rect) -> Rect {
        let [x1, y1, x2, y2] = rect.to_tlbr();
        let (ax, ay) = self.upright_to_buffer(x1, y1);
        let (bx, by) = self.upright_to_buffer(x2, y2);
        Rect::from_tlbr(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }
}

/// Width/height pair in pixels or points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Project an upright normalized image point into view coordinates.
///
/// `image_size` is the raw buffer size; the view shows the upright image
/// scaled to fill `view_bounds` with the overflow cropped evenly on both
/// sides. Returns `None` for degenerate sizes.
pub fn image_point_to_view(
    point: (f32, f32),
    orientation: Orientation,
    image_size: Size,
    view_bounds: Size,
) -> Option<Point2<f32>> {
    if image_size.is_empty() || view_bounds.is_empty() {
        return None;
    }
    let upright = if orientation.is_transposed() {
        Size::new(image_size.height, image_size.width)
    } else {
        image_size
    };

    let scale = (view_bounds.width / upright.width).max(view_bounds.height / upright.height);
    let offset_x = (view_bounds.width - upright.width * scale) / 2.0;
    let offset_y = (view_bounds.height - upright.height * scale) / 2.0;

    Some(Point2::new(
        point.0 * upright.width * scale + offset_x,
        point.1 * upright.height * scale + offset_y,
    ))
}

/// Horizontal bearing toward a box from its position in frame.
/// Negative values are to the left of centre.
pub fn bearing_from_box(rect: &Rect, horizontal_fov_degrees: f32) -> f32 {
    (rect.mid_x() - 0.5) * horizontal_fov_degrees
}
