mod promoter;
mod registry;
mod session;

pub use promoter::{AnchorPromoter, PromotionReport};
pub use registry::{AnchorRegistry, bearing_between};
pub use session::{AnchorId, SpatialSession, WorldTransform};
