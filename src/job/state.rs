use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of rewrite the remote job performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationType {
    #[default]
    LanguageUpgrade,
    SqlConversion,
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformationType::LanguageUpgrade => write!(f, "LANGUAGE_UPGRADE"),
            TransformationType::SqlConversion => write!(f, "SQL_CONVERSION"),
        }
    }
}

/// Client-side lifecycle status of the current job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    NotStarted,
    Running,
    Paused,
    Succeeded,
    PartiallySucceeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether moving from `self` to `next` keeps the run monotonic.
    ///
    /// - `Cancelled`, `Succeeded` and `PartiallySucceeded` are final.
    /// - `Failed` may still become `Cancelled`: cancellation overrides any
    ///   failure classification.
    /// - Nothing returns to `NotStarted` except through [`JobState::reset`].
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (current, next) if current == next => true,
            (Cancelled | Succeeded | PartiallySucceeded, _) => false,
            (Failed, Cancelled) => true,
            (Failed, _) => false,
            (_, NotStarted) => false,
            _ => true,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::NotStarted => write!(f, "NOT_STARTED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Paused => write!(f, "PAUSED"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::PartiallySucceeded => write!(f, "PARTIALLY_SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Phases tracked locally for progress display, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanStep {
    UploadCode,
    BuildCode,
    GeneratePlan,
    TransformCode,
}

impl PlanStep {
    pub const ALL: [PlanStep; 4] = [
        PlanStep::UploadCode,
        PlanStep::BuildCode,
        PlanStep::GeneratePlan,
        PlanStep::TransformCode,
    ];
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::UploadCode => write!(f, "uploadCode"),
            PlanStep::BuildCode => write!(f, "buildCode"),
            PlanStep::GeneratePlan => write!(f, "generatePlan"),
            PlanStep::TransformCode => write!(f, "transformCode"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepProgress {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

/// Parameters of a transformation run, as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub project_path: PathBuf,
    pub transformation_type: TransformationType,
    pub source_version: String,
    pub target_version: String,
    pub build_command: Option<String>,
}

/// The single record of the in-flight job.
///
/// Owned by the orchestrator; stages receive `&mut JobState` and never keep
/// their own copy.
#[derive(Debug, Clone)]
pub struct JobState {
    /// Empty until the remote start call assigns one.
    pub job_id: String,
    status: JobStatus,
    pub transformation_type: TransformationType,
    pub source_version: String,
    pub target_version: String,
    pub project_path: PathBuf,
    pub build_command: Option<String>,
    pub payload_file_path: Option<PathBuf>,
    pub build_log_path: Option<PathBuf>,
    pub upload_id: String,
    pub hil_attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    failure_notification: Option<String>,
    failure_chat_message: Option<String>,
    plan_steps: BTreeMap<PlanStep, StepProgress>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            job_id: String::new(),
            status: JobStatus::NotStarted,
            transformation_type: TransformationType::default(),
            source_version: String::new(),
            target_version: String::new(),
            project_path: PathBuf::new(),
            build_command: None,
            payload_file_path: None,
            build_log_path: None,
            upload_id: String::new(),
            hil_attempts: 0,
            started_at: None,
            failure_notification: None,
            failure_chat_message: None,
            plan_steps: PlanStep::ALL
                .iter()
                .map(|step| (*step, StepProgress::Pending))
                .collect(),
        }
    }
}

impl JobState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Reset, then load the request and mark the run as started.
    pub fn begin(&mut self, request: &TransformRequest) {
        self.reset();
        self.transformation_type = request.transformation_type;
        self.source_version = request.source_version.clone();
        self.target_version = request.target_version.clone();
        self.project_path = request.project_path.clone();
        self.build_command = request.build_command.clone();
        self.started_at = Some(Utc::now());
        self.status = JobStatus::Running;
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Apply a status transition. Returns `false` and leaves the status
    /// untouched when the move would break monotonicity.
    pub fn set_status(&mut self, next: JobStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Record user-facing failure copy. Each field keeps the first non-empty
    /// value it receives.
    pub fn set_failure(&mut self, notification: impl Into<String>, chat_message: impl Into<String>) {
        let notification = notification.into();
        let chat_message = chat_message.into();
        if self.failure_notification.is_none() && !notification.is_empty() {
            self.failure_notification = Some(notification);
        }
        if self.failure_chat_message.is_none() && !chat_message.is_empty() {
            self.failure_chat_message = Some(chat_message);
        }
    }

    /// Overwrite any failure copy already recorded.
    pub fn replace_failure(
        &mut self,
        notification: impl Into<String>,
        chat_message: impl Into<String>,
    ) {
        self.failure_notification = Some(notification.into());
        self.failure_chat_message = Some(chat_message.into());
    }

    pub fn failure_notification(&self) -> Option<&str> {
        self.failure_notification.as_deref()
    }

    pub fn failure_chat_message(&self) -> Option<&str> {
        self.failure_chat_message.as_deref()
    }

    pub fn set_step(&mut self, step: PlanStep, progress: StepProgress) {
        self.plan_steps.insert(step, progress);
    }

    pub fn plan_steps(&self) -> &BTreeMap<PlanStep, StepProgress> {
        &self.plan_steps
    }

    /// Mark every step that has not succeeded as failed, returning the steps
    /// that changed.
    pub fn fail_unfinished_steps(&mut self) -> Vec<PlanStep> {
        let mut changed = Vec::new();
        for (step, progress) in self.plan_steps.iter_mut() {
            if *progress != StepProgress::Succeeded && *progress != StepProgress::Failed {
                *progress = StepProgress::Failed;
                changed.push(*step);
            }
        }
        changed
    }
}
