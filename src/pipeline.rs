mod coordinator;
mod snapshot;

pub use coordinator::{FrameContext, FramePipeline};
pub use snapshot::{CandidateView, PresentationSnapshot};
