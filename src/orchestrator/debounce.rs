//! Trailing-edge debounce for arg edits.
//!
//! Every qualifying edit schedules its own single-shot rerun request tagged with the
//! sequence id current at edit time. The controller drops any request whose tag no
//! longer matches the live counter, so only the last edit of a burst reruns.

use crate::model::ControllerEvent;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Duration, Instant};

pub(crate) const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(150);

pub(crate) struct DebounceScheduler {
    interval: Duration,
    event_tx: UnboundedSender<ControllerEvent>,
}

impl DebounceScheduler {
    pub fn new(interval: Duration, event_tx: UnboundedSender<ControllerEvent>) -> Self {
        Self { interval, event_tx }
    }

    /// Post `RerunRequested { tag }` once the quiescence interval has elapsed from now.
    pub fn schedule(&self, tag: u64) {
        let deadline = Instant::now() + self.interval;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Receiver gone means the controller already shut down.
            let _ = tx.send(ControllerEvent::RerunRequested { tag });
        });
    }
}
