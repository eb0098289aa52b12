mod model;
mod status;
mod store;

pub use model::{Candidate, CandidateId};
pub use status::{MatchStatus, RejectReason};
pub use store::CandidateStore;
