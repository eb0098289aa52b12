mod announcer;
mod driver;
mod outputs;
mod phrases;
mod proximity;

pub use announcer::NavigationAnnouncer;
pub use driver::spawn_feedback_loop;
pub use outputs::{PulseOutput, SpeechOutput};
pub use phrases::{direction_words, retry_phrase, status_phrase, waiting_phrase};
pub use proximity::{
    ChannelState, IntervalMapping, IntervalStep, ProximityController, PulseChannel, best_target,
    centering_score,
};
