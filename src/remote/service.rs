use super::error::RemoteError;
use super::types::{
    ArtifactRef, ResumeOutcome, StartJobRequest, StatusReport, TransformationPlan, UploadContext,
    UploadRequest, UploadTarget,
};

/// Operations the orchestrator needs from the remote transformation service.
///
/// [`RemoteClient`](super::RemoteClient) is the HTTP implementation; tests use
/// in-memory doubles.
pub trait TransformService {
    /// Ask the service for a destination to upload a payload to.
    async fn create_upload_target(&self, req: &UploadRequest) -> Result<UploadTarget, RemoteError>;

    /// Transfer payload bytes to a previously issued target.
    async fn upload_payload(
        &self,
        target: &UploadTarget,
        bytes: Vec<u8>,
        context: Option<&UploadContext>,
    ) -> Result<(), RemoteError>;

    /// Start a job from an uploaded payload, returning its id.
    async fn start_job(&self, req: &StartJobRequest) -> Result<String, RemoteError>;

    async fn get_status(&self, job_id: &str) -> Result<StatusReport, RemoteError>;

    async fn get_transformation_plan(&self, job_id: &str)
    -> Result<TransformationPlan, RemoteError>;

    async fn download_result_archive(
        &self,
        job_id: &str,
        artifact: &ArtifactRef,
    ) -> Result<Vec<u8>, RemoteError>;

    async fn resume_job(&self, job_id: &str, outcome: ResumeOutcome) -> Result<(), RemoteError>;

    async fn stop_job(&self, job_id: &str) -> Result<(), RemoteError>;
}
