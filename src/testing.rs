//! In-memory doubles for the remote service and the dependency tool.

use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::control::CancelHandle;
use crate::error::TransformError;
use crate::hil::DependencyTool;
use crate::remote::{
    ArtifactRef, DownloadArtifact, ProgressUpdate, RemoteError, RemoteStatus, ResumeOutcome,
    StartJobRequest, StatusReport, TransformService, TransformationPlan, TransformationStep,
    UploadContext, UploadRequest, UploadTarget,
};

pub const HIL_GROUP_ID: &str = "org.apache.commons";
pub const HIL_ARTIFACT_ID: &str = "commons-lang3";
pub const HIL_SOURCE_VERSION: &str = "3.1";

pub const REPORT_WITH_VERSIONS: &str = r#"<DependencyUpdatesReport>
  <dependencies>
    <dependency>
      <groupId>org.apache.commons</groupId>
      <artifactId>commons-lang3</artifactId>
      <currentVersion>3.1</currentVersion>
      <lastVersion>3.14.0</lastVersion>
      <minors><minor>3.2</minor><minor>3.14.0</minor></minors>
      <status>minor available</status>
    </dependency>
  </dependencies>
</DependencyUpdatesReport>"#;

pub const REPORT_NO_VERSIONS: &str = r#"<DependencyUpdatesReport>
  <dependencies>
    <dependency>
      <groupId>org.apache.commons</groupId>
      <artifactId>commons-lang3</artifactId>
      <currentVersion>3.1</currentVersion>
      <status>no new available</status>
    </dependency>
  </dependencies>
</DependencyUpdatesReport>"#;

/// Remote calls recorded by [`MockService`]. Status queries are only counted.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateUploadTarget { context: Option<UploadContext> },
    UploadPayload {
        bytes: usize,
        context: Option<UploadContext>,
    },
    StartJob { upload_id: String },
    GetPlan,
    Download { artifact_id: String },
    Resume(ResumeOutcome),
    Stop,
}

struct Inner {
    statuses: VecDeque<Result<StatusReport, RemoteError>>,
    default_status: RemoteStatus,
    start_error: Option<String>,
    fail_upload: bool,
    fail_resume_completed: bool,
    plan: TransformationPlan,
    archive: Vec<u8>,
    cancel_on_upload: Option<CancelHandle>,
    cancel_on_start: Option<CancelHandle>,
    calls: Vec<Call>,
    status_queries: usize,
}

/// Scripted [`TransformService`]. Status results are served in push order,
/// then `default_status` (COMPLETED unless overridden) forever.
pub struct MockService {
    inner: Mutex<Inner>,
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockService {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                statuses: VecDeque::new(),
                default_status: RemoteStatus::Completed,
                start_error: None,
                fail_upload: false,
                fail_resume_completed: false,
                plan: TransformationPlan::default(),
                archive: Vec::new(),
                cancel_on_upload: None,
                cancel_on_start: None,
                calls: Vec::new(),
                status_queries: 0,
            }),
        }
    }

    fn with(self, f: impl FnOnce(&mut Inner)) -> Self {
        f(&mut self.inner.lock().unwrap());
        self
    }

    pub fn with_statuses(self, statuses: impl IntoIterator<Item = RemoteStatus>) -> Self {
        self.with(|inner| {
            inner
                .statuses
                .extend(statuses.into_iter().map(|s| Ok(StatusReport::new(s))));
        })
    }

    pub fn with_default_status(self, status: RemoteStatus) -> Self {
        self.with(|inner| inner.default_status = status)
    }

    pub fn failing_start(self, message: &str) -> Self {
        let message = message.to_string();
        self.with(|inner| inner.start_error = Some(message))
    }

    pub fn failing_upload(self) -> Self {
        self.with(|inner| inner.fail_upload = true)
    }

    pub fn failing_resume_completed(self) -> Self {
        self.with(|inner| inner.fail_resume_completed = true)
    }

    pub fn with_plan(self, plan: TransformationPlan) -> Self {
        self.with(|inner| inner.plan = plan)
    }

    pub fn with_archive(self, archive: Vec<u8>) -> Self {
        self.with(|inner| inner.archive = archive)
    }

    /// Fire `handle` once the project payload has been transferred.
    pub fn cancel_on_upload(&self, handle: CancelHandle) {
        self.inner.lock().unwrap().cancel_on_upload = Some(handle);
    }

    /// Fire `handle` while the start call is in flight, before it answers.
    pub fn cancel_on_start(&self, handle: CancelHandle) {
        self.inner.lock().unwrap().cancel_on_start = Some(handle);
    }

    pub fn push_status(&self, status: RemoteStatus) {
        self.push_report(StatusReport::new(status));
    }

    pub fn push_report(&self, report: StatusReport) {
        self.inner.lock().unwrap().statuses.push_back(Ok(report));
    }

    pub fn push_status_error(&self, error: RemoteError) {
        self.inner.lock().unwrap().statuses.push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.inner.lock().unwrap().status_queries
    }

    pub fn resume_calls(&self) -> Vec<ResumeOutcome> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Resume(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

impl TransformService for MockService {
    async fn create_upload_target(&self, req: &UploadRequest) -> Result<UploadTarget, RemoteError> {
        self.record(Call::CreateUploadTarget {
            context: req.upload_context.clone(),
        });
        Ok(UploadTarget {
            upload_id: "upload-1".into(),
            upload_url: "https://upload.test/upload-1".into(),
        })
    }

    async fn upload_payload(
        &self,
        _target: &UploadTarget,
        bytes: Vec<u8>,
        context: Option<&UploadContext>,
    ) -> Result<(), RemoteError> {
        self.record(Call::UploadPayload {
            bytes: bytes.len(),
            context: context.cloned(),
        });
        let inner = self.inner.lock().unwrap();
        if inner.fail_upload {
            return Err(RemoteError::Api {
                status: 403,
                message: "upload rejected".into(),
            });
        }
        if let Some(handle) = &inner.cancel_on_upload {
            handle.cancel();
        }
        Ok(())
    }

    async fn start_job(&self, req: &StartJobRequest) -> Result<String, RemoteError> {
        self.record(Call::StartJob {
            upload_id: req.upload_id.clone(),
        });
        let inner = self.inner.lock().unwrap();
        if let Some(handle) = &inner.cancel_on_start {
            handle.cancel();
        }
        match &inner.start_error {
            Some(message) => Err(RemoteError::Api {
                status: 400,
                message: message.clone(),
            }),
            None => Ok("J1".into()),
        }
    }

    async fn get_status(&self, _job_id: &str) -> Result<StatusReport, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_queries += 1;
        match inner.statuses.pop_front() {
            Some(result) => result,
            None => Ok(StatusReport::new(inner.default_status.clone())),
        }
    }

    async fn get_transformation_plan(
        &self,
        _job_id: &str,
    ) -> Result<TransformationPlan, RemoteError> {
        self.record(Call::GetPlan);
        Ok(self.inner.lock().unwrap().plan.clone())
    }

    async fn download_result_archive(
        &self,
        _job_id: &str,
        artifact: &ArtifactRef,
    ) -> Result<Vec<u8>, RemoteError> {
        self.record(Call::Download {
            artifact_id: artifact.id.clone(),
        });
        Ok(self.inner.lock().unwrap().archive.clone())
    }

    async fn resume_job(&self, _job_id: &str, outcome: ResumeOutcome) -> Result<(), RemoteError> {
        self.record(Call::Resume(outcome));
        if outcome == ResumeOutcome::Completed && self.inner.lock().unwrap().fail_resume_completed
        {
            return Err(RemoteError::Api {
                status: 500,
                message: "resume failed".into(),
            });
        }
        Ok(())
    }

    async fn stop_job(&self, _job_id: &str) -> Result<(), RemoteError> {
        self.record(Call::Stop);
        Ok(())
    }
}

/// [`DependencyTool`] that returns a fixed report or error.
pub struct MockTool {
    result: Result<String, String>,
    hang: Option<CancellationToken>,
    invocations: Mutex<Vec<PathBuf>>,
}

impl MockTool {
    pub fn with_report(report: &str) -> Self {
        Self {
            result: Ok(report.to_string()),
            hang: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            hang: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Fires `token` once invoked and then never finishes, like a build tool
    /// stuck resolving a repository when the operator gives up.
    pub fn hanging_until_cancelled(token: CancellationToken) -> Self {
        Self {
            hang: Some(token),
            ..Self::with_report("")
        }
    }

    pub fn invocations(&self) -> Vec<PathBuf> {
        self.invocations.lock().unwrap().clone()
    }
}

impl DependencyTool for MockTool {
    async fn list_versions(&self, descriptor: &Path) -> Result<String, TransformError> {
        self.invocations
            .lock()
            .unwrap()
            .push(descriptor.to_path_buf());
        if let Some(token) = &self.hang {
            token.cancel();
            std::future::pending::<()>().await;
        }
        self.result
            .clone()
            .map_err(TransformError::DependencyTool)
    }
}

/// Plan whose last progress update advertises the dependency artifact.
pub fn hil_plan() -> TransformationPlan {
    TransformationPlan {
        steps: vec![TransformationStep {
            name: "Upgrade dependencies".into(),
            description: None,
            status: Some("PAUSED".into()),
            progress_updates: vec![
                ProgressUpdate {
                    name: "Build project".into(),
                    status: Some("COMPLETED".into()),
                    description: None,
                    download_artifacts: Vec::new(),
                },
                ProgressUpdate {
                    name: "Resolve dependency".into(),
                    status: Some("PAUSED".into()),
                    description: None,
                    download_artifacts: vec![DownloadArtifact {
                        download_artifact_id: Some("artifact-1".into()),
                        download_artifact_type: Some("Dependencies".into()),
                    }],
                },
            ],
        }],
    }
}

/// Plan whose artifact lacks a type.
pub fn incomplete_hil_plan() -> TransformationPlan {
    let mut plan = hil_plan();
    plan.steps[0].progress_updates[1].download_artifacts[0].download_artifact_type = None;
    plan
}

pub fn hil_pom() -> String {
    format!(
        r#"<project>
  <modelVersion>4.0.0</modelVersion>
  <dependencies>
    <dependency>
      <groupId>{HIL_GROUP_ID}</groupId>
      <artifactId>{HIL_ARTIFACT_ID}</artifactId>
      <version>3.0</version>
    </dependency>
  </dependencies>
</project>"#
    )
}

/// Zip the way the service ships a paused job's dependency artifact.
pub fn hil_archive() -> Vec<u8> {
    let manifest = serde_json::json!({
        "hilCapability": "HIL_1pDependency_VersionUpgrade",
        "pomGroupId": HIL_GROUP_ID,
        "pomArtifactId": HIL_ARTIFACT_ID,
        "sourcePomVersion": HIL_SOURCE_VERSION,
    });
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("manifest.json", options).unwrap();
    writer
        .write_all(manifest.to_string().as_bytes())
        .unwrap();
    writer.start_file("pom.xml", options).unwrap();
    writer.write_all(hil_pom().as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}
