use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::throw_if_cancelled;
use super::upload::UploadHandle;
use crate::error::{StartFailureKind, TransformError};
use crate::job::JobState;
use crate::remote::{StartJobRequest, TransformService};

/// Turns an uploaded payload into a running remote job.
pub struct SubmissionStage {
    cooldown: Duration,
}

impl SubmissionStage {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Start the remote job and record its id on `state`.
    ///
    /// Start failures are classified and their user-facing copy is written to
    /// `state` before the error is returned.
    pub async fn start<S: TransformService>(
        &self,
        service: &S,
        state: &mut JobState,
        handle: &UploadHandle,
        cancel: &CancellationToken,
    ) -> Result<String, TransformError> {
        throw_if_cancelled(cancel)?;

        let request = StartJobRequest {
            upload_id: handle.upload_id.clone(),
            transformation_type: state.transformation_type,
            source: state.source_version.clone(),
            target: state.target_version.clone(),
        };

        let job_id = match service.start_job(&request).await {
            Ok(job_id) => job_id,
            Err(err) => {
                let message = err.to_string();
                let kind = StartFailureKind::classify(&message);
                error!(upload_id = %handle.upload_id, %kind, error = %message, "job failed to start");
                state.set_failure(kind.notification(), kind.chat_message());
                return Err(TransformError::JobStart { kind, message });
            }
        };

        info!(job_id = %job_id, upload_id = %handle.upload_id, "job started");
        state.job_id = job_id.clone();

        sleep(self.cooldown).await;
        throw_if_cancelled(cancel)?;

        Ok(job_id)
    }
}
