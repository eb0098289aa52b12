mod crop;
mod http;
mod oracle;
mod verifier;

pub use crop::{CroppedImage, crop_region};
pub use http::{HttpOracle, parse_response};
pub use oracle::{Verdict, VerificationOracle, VerificationRequest, VerificationResponse};
pub use verifier::Verifier;
