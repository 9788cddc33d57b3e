use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{JobState, JobStatus, PlanStep, StepProgress, TransformationType};

/// Terminal disposition of a run as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    Succeeded,
    PartiallySucceeded,
    Failed,
    Cancelled,
}

impl JobOutcome {
    /// Non-terminal statuses count as failures: a run that stops without
    /// reaching a verdict did not succeed.
    pub fn from_status(status: JobStatus) -> Self {
        match status {
            JobStatus::Succeeded => JobOutcome::Succeeded,
            JobStatus::PartiallySucceeded => JobOutcome::PartiallySucceeded,
            JobStatus::Cancelled => JobOutcome::Cancelled,
            _ => JobOutcome::Failed,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, JobOutcome::Succeeded | JobOutcome::PartiallySucceeded)
    }
}

/// Record produced at the end of a run, captured before cleanup resets the
/// job state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub job_id: String,
    pub outcome: JobOutcome,
    pub transformation_type: TransformationType,
    pub source_version: String,
    pub target_version: String,
    pub notification: Option<String>,
    pub chat_message: Option<String>,
    pub plan_steps: BTreeMap<PlanStep, StepProgress>,
    pub hil_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunSummary {
    pub fn capture(state: &JobState) -> Self {
        let now = Utc::now();
        let started_at = state.started_at.unwrap_or(now);
        Self {
            job_id: state.job_id.clone(),
            outcome: JobOutcome::from_status(state.status()),
            transformation_type: state.transformation_type,
            source_version: state.source_version.clone(),
            target_version: state.target_version.clone(),
            notification: state.failure_notification().map(str::to_string),
            chat_message: state.failure_chat_message().map(str::to_string),
            plan_steps: state.plan_steps().clone(),
            hil_attempts: state.hil_attempts,
            started_at,
            completed_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }
}
