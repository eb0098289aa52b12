use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug};

use crate::diagnostics::Diagnostics;
use crate::feedback::announcer::NavigationAnnouncer;
use crate::feedback::proximity::{ProximityController, best_target};
use crate::pipeline::PresentationSnapshot;

/// Run the announcer and proximity controller on every published snapshot.
///
/// The task ends, silencing both pulse channels, once the pipeline that owns
/// the sending side is dropped.
pub fn spawn_feedback_loop(
    mut snapshots: watch::Receiver<PresentationSnapshot>,
    mut announcer: NavigationAnnouncer,
    mut proximity: ProximityController,
    diag: Diagnostics,
) -> JoinHandle<()> {
    let span = diag.span().clone();
    tokio::spawn(
        async move {
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                announcer.tick(&snapshot, Instant::now());
                proximity.tick(best_target(&snapshot));
            }
            proximity.stop();
            debug!("snapshot channel closed; feedback stopped");
        }
        .instrument(span),
    )
}
