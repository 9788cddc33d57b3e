//! Sequential stages that take a job from local project to running remote job.

mod submit;
mod upload;

pub use submit::SubmissionStage;
pub use upload::{UploadHandle, UploadStage};

use tokio_util::sync::CancellationToken;

use crate::error::TransformError;

/// Cooperative cancellation check used at stage boundaries.
pub fn throw_if_cancelled(cancel: &CancellationToken) -> Result<(), TransformError> {
    if cancel.is_cancelled() {
        Err(TransformError::Cancelled)
    } else {
        Ok(())
    }
}
