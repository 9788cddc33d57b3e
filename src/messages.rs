//! User-facing copy: short notifications plus longer chat explanations.

pub const JOB_FAILED_NOTIFICATION: &str = "The transformation job did not complete.";
pub const JOB_FAILED_CHAT: &str = "Sorry, I couldn't complete the transformation. \
    Check the job history for details and try starting a new job.";

pub const CANCELLED_NOTIFICATION: &str = "The transformation was cancelled.";
pub const CANCELLED_CHAT: &str = "I stopped the transformation as requested. \
    No changes were applied to your project.";

pub const SUCCEEDED_NOTIFICATION: &str = "The transformation completed.";
pub const PARTIALLY_SUCCEEDED_NOTIFICATION: &str = "The transformation partially completed.";

pub const TOO_MANY_JOBS_NOTIFICATION: &str =
    "Unable to start the transformation: too many jobs are running for this account.";
pub const TOO_MANY_JOBS_CHAT: &str = "I couldn't start the transformation because the \
    account already has the maximum number of jobs running. Wait for a running job \
    to finish, then try again.";

pub const LOC_LIMIT_NOTIFICATION: &str =
    "Unable to start the transformation: the project exceeds the lines-of-code limit.";
pub const LOC_LIMIT_CHAT: &str = "I couldn't start the transformation because the \
    project is larger than the lines-of-code allowance for this account. Try a \
    smaller module or request a higher limit.";

pub const START_FAILED_NOTIFICATION: &str = "Unable to start the transformation job.";
pub const START_FAILED_CHAT: &str = "Sorry, I couldn't start the transformation job. \
    Try again in a few minutes.";

pub const PACKAGING_FAILED_NOTIFICATION: &str = "Unable to package the project for upload.";
pub const PACKAGING_FAILED_CHAT: &str = "I couldn't package the project.";

pub const UPLOAD_FAILED_NOTIFICATION: &str = "Unable to upload the project.";
pub const UPLOAD_FAILED_CHAT: &str = "I couldn't upload the project. Check your network \
    connection and credentials, then try again.";

pub const POLL_TIMEOUT_NOTIFICATION: &str = "The transformation job timed out.";
pub const POLL_TIMEOUT_CHAT: &str = "The transformation job is taking longer than \
    expected, so I stopped waiting for it.";

pub const PRE_BUILD_FAILED_NOTIFICATION: &str = "The project failed to build before transformation.";
pub const PRE_BUILD_FAILED_CHAT: &str = "The remote build of your project failed before \
    the transformation could start:";

pub const HIL_EXHAUSTED_NOTIFICATION: &str = "Dependency resolution could not be completed.";
pub const HIL_EXHAUSTED_CHAT: &str = "The job kept asking for dependency updates, so I \
    stopped resolving them";

pub const HIL_NO_VERSIONS_CHAT: &str = "I couldn't find alternate versions of the \
    dependency, so the job will continue without updating it.";
pub const HIL_RESUMED_CHAT: &str = "I updated the dependency and resumed the job.";
