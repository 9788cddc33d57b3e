//! Outbound events published by the orchestration core.
//!
//! The core never renders anything; it pushes [`JobEvent`]s into an unbounded
//! channel and moves on. A closed or absent receiver is not an error.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::hil::VersionCandidates;
use crate::job::{JobOutcome, JobStatus, PlanStep, StepProgress};
use crate::remote::RemoteStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    StatusChanged {
        status: JobStatus,
    },
    StepChanged {
        step: PlanStep,
        progress: StepProgress,
    },
    JobStarted {
        job_id: String,
    },
    RemoteStatusObserved {
        job_id: String,
        status: RemoteStatus,
    },
    /// Periodic refresh emitted by the progress refresher.
    Heartbeat {
        job_id: String,
        status: JobStatus,
        elapsed: Duration,
    },
    DependencyChoiceRequested {
        job_id: String,
        dependency: String,
        current_version: String,
        candidates: VersionCandidates,
    },
    DependencyChoiceIgnored {
        version: String,
    },
    /// Exactly one per dependency-resolution attempt.
    HilOutcome {
        job_id: String,
        succeeded: bool,
        detail: String,
    },
    Notification {
        message: String,
        chat_message: String,
    },
    Finished {
        outcome: JobOutcome,
    },
    CleanedUp,
}

#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
