use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::messages;
use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Packaging error: {0}")]
    Packaging(String),

    #[error("Upload failed: {0}")]
    UploadTransport(#[source] RemoteError),

    #[error("Job failed to start ({kind}): {message}")]
    JobStart {
        kind: StartFailureKind,
        message: String,
    },

    #[error("Job {job_id} did not reach {target} within {elapsed_secs}s")]
    PollTimeout {
        job_id: String,
        target: &'static str,
        elapsed_secs: u64,
    },

    #[error("Status query for job {job_id} failed: {source}")]
    PollTransport {
        job_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("Job {job_id} failed before the build completed: {reason}")]
    PreBuildFailure {
        job_id: String,
        reason: String,
        log_path: PathBuf,
    },

    #[error("No alternate versions available for {dependency}")]
    NoAlternateVersions { dependency: String },

    #[error("Dependency choice declined by the operator")]
    DependencyChoiceDeclined,

    #[error("Transformation cancelled")]
    Cancelled,

    #[error("A transformation job is already in progress")]
    JobAlreadyActive,

    #[error("Dependency resolution gave up after {attempts} attempts")]
    HilAttemptsExhausted { attempts: u32 },

    #[error("Plan for job {0} does not name a downloadable artifact")]
    MissingArtifact(String),

    #[error("Invalid dependency manifest: {0}")]
    InvalidManifest(String),

    #[error("Dependency tool failed: {0}")]
    DependencyTool(String),

    #[error("Project not eligible: {0}")]
    ProjectNotEligible(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job control channel is closed")]
    ControlClosed,

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransformError {
    /// User-facing notification and chat copy for errors that carry a specific
    /// explanation. `None` means the generic failure copy applies.
    pub fn failure_messages(&self) -> Option<(String, String)> {
        match self {
            TransformError::Packaging(detail) => Some((
                messages::PACKAGING_FAILED_NOTIFICATION.to_string(),
                format!("{} {detail}", messages::PACKAGING_FAILED_CHAT),
            )),
            TransformError::UploadTransport(_) => Some((
                messages::UPLOAD_FAILED_NOTIFICATION.to_string(),
                messages::UPLOAD_FAILED_CHAT.to_string(),
            )),
            TransformError::JobStart { kind, .. } => Some((
                kind.notification().to_string(),
                kind.chat_message().to_string(),
            )),
            TransformError::PollTimeout { .. } => Some((
                messages::POLL_TIMEOUT_NOTIFICATION.to_string(),
                messages::POLL_TIMEOUT_CHAT.to_string(),
            )),
            TransformError::PreBuildFailure {
                reason, log_path, ..
            } => Some((
                messages::PRE_BUILD_FAILED_NOTIFICATION.to_string(),
                format!(
                    "{} {reason}\nBuild log: {}",
                    messages::PRE_BUILD_FAILED_CHAT,
                    log_path.display()
                ),
            )),
            TransformError::HilAttemptsExhausted { attempts } => Some((
                messages::HIL_EXHAUSTED_NOTIFICATION.to_string(),
                format!(
                    "{} ({attempts} attempts)",
                    messages::HIL_EXHAUSTED_CHAT
                ),
            )),
            _ => None,
        }
    }
}

/// Classification of a failed "start job" call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StartFailureKind {
    /// The account already has the maximum number of running jobs.
    TooManyActiveJobs,
    /// The uploaded project exceeds the lines-of-code allowance.
    LocLimitExceeded,
    Generic,
}

impl StartFailureKind {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("too many active running jobs") {
            StartFailureKind::TooManyActiveJobs
        } else if lower.contains("lines of code") {
            StartFailureKind::LocLimitExceeded
        } else {
            StartFailureKind::Generic
        }
    }

    pub fn notification(&self) -> &'static str {
        match self {
            StartFailureKind::TooManyActiveJobs => messages::TOO_MANY_JOBS_NOTIFICATION,
            StartFailureKind::LocLimitExceeded => messages::LOC_LIMIT_NOTIFICATION,
            StartFailureKind::Generic => messages::START_FAILED_NOTIFICATION,
        }
    }

    pub fn chat_message(&self) -> &'static str {
        match self {
            StartFailureKind::TooManyActiveJobs => messages::TOO_MANY_JOBS_CHAT,
            StartFailureKind::LocLimitExceeded => messages::LOC_LIMIT_CHAT,
            StartFailureKind::Generic => messages::START_FAILED_CHAT,
        }
    }
}

impl fmt::Display for StartFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartFailureKind::TooManyActiveJobs => write!(f, "TooManyActiveJobs"),
            StartFailureKind::LocLimitExceeded => write!(f, "LocLimitExceeded"),
            StartFailureKind::Generic => write!(f, "Generic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_quota_message() {
        let kind = StartFailureKind::classify(
            "ThrottlingException: Too many active running jobs for this account",
        );
        assert_eq!(kind, StartFailureKind::TooManyActiveJobs);
        assert_eq!(kind.notification(), messages::TOO_MANY_JOBS_NOTIFICATION);
    }

    #[test]
    fn classify_loc_limit_message() {
        let kind = StartFailureKind::classify(
            "ValidationException: project exceeds the maximum lines of code allowed",
        );
        assert_eq!(kind, StartFailureKind::LocLimitExceeded);
    }

    #[test]
    fn classify_falls_back_to_generic() {
        assert_eq!(
            StartFailureKind::classify("connection reset by peer"),
            StartFailureKind::Generic
        );
        assert_eq!(StartFailureKind::classify(""), StartFailureKind::Generic);
    }

    #[test]
    fn generic_errors_have_no_specific_copy() {
        assert!(TransformError::Cancelled.failure_messages().is_none());
        assert!(
            TransformError::MissingArtifact("J1".into())
                .failure_messages()
                .is_none()
        );
    }

    #[test]
    fn pre_build_failure_chat_points_at_log() {
        let err = TransformError::PreBuildFailure {
            job_id: "J1".into(),
            reason: "compilation failed".into(),
            log_path: PathBuf::from("/tmp/build-logs.txt"),
        };
        let (notification, chat) = err.failure_messages().unwrap();
        assert_eq!(notification, messages::PRE_BUILD_FAILED_NOTIFICATION);
        assert!(chat.contains("compilation failed"));
        assert!(chat.contains("/tmp/build-logs.txt"));
    }

    #[test]
    fn error_display() {
        let err = TransformError::JobStart {
            kind: StartFailureKind::Generic,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Job failed to start (Generic): boom");
    }
}
