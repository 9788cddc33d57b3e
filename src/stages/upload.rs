use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

use crate::archive::{self, PayloadManifest};
use crate::error::TransformError;
use crate::job::JobState;
use crate::remote::{TransformService, UploadArtifactType, UploadContext, UploadRequest};

/// Result of a successful project upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHandle {
    pub payload_path: PathBuf,
    /// Also serves as the correlation id until the job id is known.
    pub upload_id: String,
    pub byte_size: u64,
}

/// Packages payloads and transfers them to the remote service.
pub struct UploadStage {
    work_dir: PathBuf,
    cooldown: Duration,
}

impl UploadStage {
    pub fn new(work_dir: PathBuf, cooldown: Duration) -> Self {
        Self { work_dir, cooldown }
    }

    /// Package the project named by `state` and upload it.
    ///
    /// The payload path is recorded on the state before packaging starts so
    /// cleanup removes partial archives too.
    pub async fn upload<S: TransformService>(
        &self,
        service: &S,
        state: &mut JobState,
    ) -> Result<UploadHandle, TransformError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| TransformError::Packaging(format!("cannot create work dir: {e}")))?;

        let payload_path = self.work_dir.join(format!("payload-{}.zip", Uuid::new_v4()));
        state.payload_file_path = Some(payload_path.clone());

        let manifest = PayloadManifest::for_project(state.build_command.clone());
        let project = state.project_path.clone();
        let dest = payload_path.clone();
        let packaged_size = tokio::task::spawn_blocking(move || {
            archive::package_project(&project, &manifest, &dest)
        })
        .await
        .map_err(|e| TransformError::Packaging(format!("packaging task failed: {e}")))??;
        debug!(path = %payload_path.display(), bytes = packaged_size, "project packaged");

        let (upload_id, byte_size) = self.transfer(service, &payload_path, None).await?;
        info!(upload_id = %upload_id, bytes = byte_size, "project uploaded");

        sleep(self.cooldown).await;

        Ok(UploadHandle {
            payload_path,
            upload_id,
            byte_size,
        })
    }

    /// Upload a dependency archive produced during dependency resolution,
    /// tagged with the job it belongs to.
    pub async fn upload_dependencies<S: TransformService>(
        &self,
        service: &S,
        archive_path: &Path,
        job_id: &str,
    ) -> Result<String, TransformError> {
        let context = UploadContext {
            job_id: job_id.to_string(),
            upload_artifact_type: UploadArtifactType::Dependencies,
        };
        let (upload_id, byte_size) = self.transfer(service, archive_path, Some(context)).await?;
        info!(job_id, upload_id = %upload_id, bytes = byte_size, "dependency artifact uploaded");

        sleep(self.cooldown).await;
        Ok(upload_id)
    }

    async fn transfer<S: TransformService>(
        &self,
        service: &S,
        path: &Path,
        context: Option<UploadContext>,
    ) -> Result<(String, u64), TransformError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TransformError::Packaging(format!("cannot read {}: {e}", path.display())))?;
        let byte_size = bytes.len() as u64;
        let checksum = format!("{:x}", Sha256::digest(&bytes));

        let target = service
            .create_upload_target(&UploadRequest {
                content_checksum: checksum,
                upload_context: context.clone(),
            })
            .await
            .map_err(TransformError::UploadTransport)?;

        service
            .upload_payload(&target, bytes, context.as_ref())
            .await
            .map_err(TransformError::UploadTransport)?;

        Ok((target.upload_id, byte_size))
    }
}
