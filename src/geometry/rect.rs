use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in normalized coordinates of the upright image.
///
/// `(x, y)` is the top-left corner; the unit square is the visible frame.
/// Conversions cover the corner form used by detectors (`tlbr`) and the
/// center/aspect/height form the box smoother works in (`xyah`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn from_tlbr(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect: f32, height: f32) -> Self {
        let width = aspect * height;
        Self::new(cx - 0.5 * width, cy - 0.5 * height, width, height)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.bottom()]
    }

    /// Aspect is reported as 0 for a flat box.
    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let (cx, cy) = self.center();
        let aspect = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [cx, cy, aspect, self.height]
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.mid_x(), self.y + 0.5 * self.height)
    }

    /// Horizontal midpoint, the quantity proximity feedback is driven by.
    #[inline]
    pub fn mid_x(&self) -> f32 {
        self.x + 0.5 * self.width
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Clip to the unit square. Width and height never go negative.
    pub fn clamped(&self) -> Rect {
        let left = self.x.clamp(0.0, 1.0);
        let top = self.y.clamp(0.0, 1.0);
        let right = self.right().clamp(0.0, 1.0).max(left);
        let bottom = self.bottom().clamp(0.0, 1.0).max(top);
        Rect::from_tlbr(left, top, right, bottom)
    }

    /// Grow by `fraction` of the box size on every side.
    pub fn padded(&self, fraction: f32) -> Rect {
        let (dx, dy) = (self.width * fraction, self.height * fraction);
        Rect::from_tlbr(self.x - dx, self.y - dy, self.right() + dx, self.bottom() + dy)
    }

    /// Intersection over union. Symmetric and always in `[0, 1]`; zero-area
    /// boxes score 1 against themselves and 0 against anything else.
    pub fn iou(&self, other: &Rect) -> f32 {
        let overlap_w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let overlap_h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let overlap = overlap_w * overlap_h;
        let union = self.area() + other.area() - overlap;

        match union {
            u if u > 0.0 && u.is_finite() => (overlap / u).clamp(0.0, 1.0),
            _ if self == other => 1.0,
            _ => 0.0,
        }
    }
}

/// Pairwise IoU, rows indexed by `rows` and columns by `cols`.
pub fn iou_batch(rows: &[Rect], cols: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| rows[i].iou(&cols[j]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn xyah_describes_center_and_shape() {
        let [cx, cy, aspect, h] = Rect::new(0.1, 0.2, 0.3, 0.4).to_xyah();
        assert!(close(cx, 0.25) && close(cy, 0.4) && close(aspect, 0.75) && close(h, 0.4));

        let rebuilt = Rect::from_xyah(cx, cy, aspect, h);
        assert!(close(rebuilt.x, 0.1) && close(rebuilt.width, 0.3));
    }

    #[test]
    fn flat_box_has_zero_aspect() {
        assert_eq!(Rect::new(0.2, 0.2, 0.1, 0.0).to_xyah()[2], 0.0);
    }

    #[test]
    fn iou_of_shifted_boxes() {
        let a = Rect::new(0.0, 0.0, 0.1, 0.1);
        let b = Rect::new(0.05, 0.05, 0.1, 0.1);
        assert!((a.iou(&b) - 1.0 / 7.0).abs() < 1e-4);
        assert_eq!(a.iou(&b), b.iou(&a));
    }

    #[test]
    fn disjoint_and_identical_boxes() {
        let a = Rect::new(0.0, 0.0, 0.1, 0.1);
        assert_eq!(a.iou(&Rect::new(0.5, 0.5, 0.1, 0.1)), 0.0);
        assert!(close(a.iou(&a), 1.0));
    }

    #[test]
    fn degenerate_box_iou_stays_finite() {
        let dot = Rect::new(0.5, 0.5, 0.0, 0.0);
        let around = Rect::new(0.4, 0.4, 0.2, 0.2);
        assert_eq!(dot.iou(&around), 0.0);
        assert_eq!(around.iou(&dot), 0.0);
        assert_eq!(dot.iou(&dot), 1.0);
    }

    #[test]
    fn clamping_trims_overhang() {
        let r = Rect::new(-0.2, 0.9, 0.5, 0.5).clamped();
        assert_eq!(r.x, 0.0);
        assert!(close(r.width, 0.3));
        assert!(close(r.bottom(), 1.0));
    }

    #[test]
    fn padding_grows_every_side() {
        let r = Rect::new(0.4, 0.4, 0.2, 0.2).padded(0.5);
        assert!(close(r.x, 0.3) && close(r.right(), 0.7));
    }

    #[test]
    fn batch_matrix_is_rows_by_cols() {
        let rows = [Rect::new(0.0, 0.0, 0.1, 0.1), Rect::new(0.5, 0.5, 0.1, 0.1)];
        let cols = [Rect::new(0.0, 0.0, 0.1, 0.1)];
        let ious = iou_batch(&rows, &cols);
        assert_eq!(ious.dim(), (2, 1));
        assert!(close(ious[[0, 0]], 1.0));
        assert_eq!(ious[[1, 0]], 0.0);
    }
}
