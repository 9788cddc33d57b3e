use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{EventSink, JobEvent};
use crate::job::JobStatus;

/// Smallest period accepted; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(10);

/// What the refresher reports on each tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub job_id: String,
    pub status: JobStatus,
}

/// Background task that emits a heartbeat for the lifetime of one run.
///
/// [`stop`](Self::stop) is idempotent and also runs on drop, so the task is
/// released exactly once whichever way the run exits.
pub struct ProgressRefresher {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressRefresher {
    pub fn spawn(period: Duration, snapshot: watch::Receiver<Snapshot>, events: EventSink) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = period.max(MIN_PERIOD);

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let current = snapshot.borrow().clone();
                        events.emit(JobEvent::Heartbeat {
                            job_id: current.job_id,
                            status: current.status,
                            elapsed: started.elapsed(),
                        });
                    }
                }
            }
            debug!("progress refresher stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Stop the task. Returns `true` only for the call that actually stopped it.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                self.cancel.cancel();
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for ProgressRefresher {
    fn drop(&mut self) {
        self.stop();
    }
}
