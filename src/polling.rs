use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransformError;
use crate::remote::{RemoteStatus, StatusReport, TransformService};

/// A set of remote statuses that ends a poll.
#[derive(Debug, Clone, Copy)]
pub struct PollTarget {
    pub name: &'static str,
    accepted: &'static [RemoteStatus],
}

impl PollTarget {
    pub fn accepts(&self, status: &RemoteStatus) -> bool {
        self.accepted.contains(status)
    }
}

/// The plan has been generated (or the job already moved past it).
pub const PLAN_READY: PollTarget = PollTarget {
    name: "plan-ready",
    accepted: &[
        RemoteStatus::Planned,
        RemoteStatus::Transforming,
        RemoteStatus::Transformed,
        RemoteStatus::Paused,
        RemoteStatus::PartiallyCompleted,
        RemoteStatus::Completed,
        RemoteStatus::Failed,
        RemoteStatus::Stopping,
        RemoteStatus::Stopped,
        RemoteStatus::Rejected,
    ],
};

/// The job finished or needs operator input.
pub const JOB_COMPLETE: PollTarget = PollTarget {
    name: "job-complete",
    accepted: &[
        RemoteStatus::Paused,
        RemoteStatus::PartiallyCompleted,
        RemoteStatus::Completed,
        RemoteStatus::Failed,
        RemoteStatus::Stopping,
        RemoteStatus::Stopped,
        RemoteStatus::Rejected,
    ],
};

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Fixed-interval status poller shared by the plan-ready and completion waits.
///
/// Query errors are returned as-is; retrying them is the caller's decision.
pub struct PollingEngine {
    policy: PollPolicy,
}

impl PollingEngine {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub async fn poll<S: TransformService>(
        &self,
        service: &S,
        job_id: &str,
        target: &PollTarget,
        cancel: &CancellationToken,
    ) -> Result<StatusReport, TransformError> {
        let started = Instant::now();
        let mut queries: u32 = 0;

        loop {
            let report = service.get_status(job_id).await.map_err(|source| {
                TransformError::PollTransport {
                    job_id: job_id.to_string(),
                    source,
                }
            })?;
            queries += 1;
            debug!(job_id, status = %report.status, target = target.name, queries, "polled job status");

            if target.accepts(&report.status) {
                return Ok(report);
            }

            if let Some(timeout) = self.policy.timeout
                && started.elapsed() >= timeout
            {
                return Err(TransformError::PollTimeout {
                    job_id: job_id.to_string(),
                    target: target.name,
                    elapsed_secs: started.elapsed().as_secs(),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(TransformError::Cancelled),
                _ = sleep(self.policy.interval) => {}
            }
        }
    }
}
