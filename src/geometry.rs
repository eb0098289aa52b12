mod matching;
mod rect;
mod view;

pub use matching::{AssignmentResult, cosine_distance, linear_assignment};
pub use rect::{Rect, iou_batch};
pub use view::{Orientation, Size, bearing_from_box, image_point_to_view};
