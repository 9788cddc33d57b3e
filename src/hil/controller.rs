use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::maven::{self, VersionCandidates};
use super::tool::DependencyTool;
use crate::archive::{self, MANIFEST_FILE, PayloadManifest};
use crate::error::TransformError;
use crate::events::{EventSink, JobEvent};
use crate::messages;
use crate::remote::{ArtifactRef, ResumeOutcome, TransformService, TransformationPlan};
use crate::stages::{UploadStage, throw_if_cancelled};

const POM_FILE: &str = "pom.xml";

/// Where a dependency-resolution attempt currently stands.
///
/// ```text
/// AwaitingArtifact → ArtifactDownloaded → VersionsDiscovered
///     → AwaitingUserChoice → ChoiceApplied → Resumed
/// ```
///
/// Any state can move to `TerminatedEarly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HilPhase {
    AwaitingArtifact,
    ArtifactDownloaded,
    VersionsDiscovered,
    AwaitingUserChoice,
    ChoiceApplied,
    Resumed,
    TerminatedEarly,
}

impl fmt::Display for HilPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HilPhase::AwaitingArtifact => "AWAITING_ARTIFACT",
            HilPhase::ArtifactDownloaded => "ARTIFACT_DOWNLOADED",
            HilPhase::VersionsDiscovered => "VERSIONS_DISCOVERED",
            HilPhase::AwaitingUserChoice => "AWAITING_USER_CHOICE",
            HilPhase::ChoiceApplied => "CHOICE_APPLIED",
            HilPhase::Resumed => "RESUMED",
            HilPhase::TerminatedEarly => "TERMINATED_EARLY",
        };
        f.write_str(name)
    }
}

/// `manifest.json` shipped inside the dependency artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyManifest {
    #[serde(default)]
    pub hil_capability: String,
    pub pom_group_id: String,
    pub pom_artifact_id: String,
    pub source_pom_version: String,
}

/// Files and facts for one attempt. The temp dir goes away with the session.
struct HilSession {
    _dir: TempDir,
    root: PathBuf,
    pom_file: PathBuf,
    new_pom_file: PathBuf,
    manifest: DependencyManifest,
    candidates: VersionCandidates,
}

/// Operator answer to a dependency prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyChoice {
    Version(String),
    /// Keep the current version; the job is released with REJECTED.
    Declined,
}

/// How an attempt ended.
#[derive(Debug)]
pub enum HilResolution {
    /// The chosen version was uploaded and the job resumed.
    Resumed { version: String },
    /// The job was released with REJECTED.
    Rejected { error: TransformError },
}

/// Drives one paused job through dependency resolution and back to running.
///
/// The controller never polls; it hands control back to the caller after
/// every attempt.
pub struct HilController<'a, S, T> {
    service: &'a S,
    tool: &'a T,
    uploader: &'a UploadStage,
    events: &'a EventSink,
    cancel: &'a CancellationToken,
    choices: &'a mut mpsc::UnboundedReceiver<DependencyChoice>,
    work_dir: &'a Path,
    phase: HilPhase,
}

impl<'a, S: TransformService, T: DependencyTool> HilController<'a, S, T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service: &'a S,
        tool: &'a T,
        uploader: &'a UploadStage,
        events: &'a EventSink,
        cancel: &'a CancellationToken,
        choices: &'a mut mpsc::UnboundedReceiver<DependencyChoice>,
        work_dir: &'a Path,
    ) -> Self {
        Self {
            service,
            tool,
            uploader,
            events,
            cancel,
            choices,
            work_dir,
            phase: HilPhase::AwaitingArtifact,
        }
    }

    pub fn phase(&self) -> HilPhase {
        self.phase
    }

    /// Run one attempt. Every early exit releases the remote job with
    /// REJECTED exactly once; a failure of that call is only logged.
    pub async fn run(&mut self, job_id: &str) -> HilResolution {
        self.phase = HilPhase::AwaitingArtifact;
        let mut session = None;

        let resolution = match self.attempt(job_id, &mut session).await {
            Ok(version) => {
                self.phase = HilPhase::Resumed;
                info!(job_id, version = %version, "dependency updated, job resumed");
                self.events.emit(JobEvent::HilOutcome {
                    job_id: job_id.to_string(),
                    succeeded: true,
                    detail: format!("{} ({version})", messages::HIL_RESUMED_CHAT),
                });
                HilResolution::Resumed { version }
            }
            Err(error) => {
                let from = self.phase;
                self.phase = HilPhase::TerminatedEarly;
                warn!(job_id, phase = %from, error = %error, "dependency resolution terminated early");

                if let Err(e) = self.service.resume_job(job_id, ResumeOutcome::Rejected).await {
                    warn!(job_id, error = %e, "failed to release paused job");
                }

                let detail = match &error {
                    TransformError::NoAlternateVersions { .. } => {
                        messages::HIL_NO_VERSIONS_CHAT.to_string()
                    }
                    other => other.to_string(),
                };
                self.events.emit(JobEvent::HilOutcome {
                    job_id: job_id.to_string(),
                    succeeded: false,
                    detail,
                });
                HilResolution::Rejected { error }
            }
        };

        drop(session);
        resolution
    }

    async fn attempt(
        &mut self,
        job_id: &str,
        session: &mut Option<HilSession>,
    ) -> Result<String, TransformError> {
        throw_if_cancelled(self.cancel)?;

        let plan = self.service.get_transformation_plan(job_id).await?;
        let artifact = find_artifact(&plan)
            .ok_or_else(|| TransformError::MissingArtifact(job_id.to_string()))?;

        let opened = session.insert(self.open_session(job_id, &artifact).await?);
        self.phase = HilPhase::ArtifactDownloaded;

        let report = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TransformError::Cancelled),
            report = self.tool.list_versions(&opened.new_pom_file) => report?,
        };
        let candidates = maven::parse_dependency_report(
            &report,
            &opened.manifest.pom_group_id,
            &opened.manifest.pom_artifact_id,
        );
        if candidates.is_empty() {
            return Err(TransformError::NoAlternateVersions {
                dependency: format!(
                    "{}:{}",
                    opened.manifest.pom_group_id, opened.manifest.pom_artifact_id
                ),
            });
        }
        debug!(job_id, candidates = ?candidates.all(), "dependency versions discovered");
        opened.candidates = candidates;
        self.phase = HilPhase::VersionsDiscovered;

        let version = self.await_choice(job_id, opened).await?;

        self.apply_choice(job_id, opened, &version).await?;
        self.phase = HilPhase::ChoiceApplied;

        self.service
            .resume_job(job_id, ResumeOutcome::Completed)
            .await?;
        Ok(version)
    }

    async fn open_session(
        &self,
        job_id: &str,
        artifact: &ArtifactRef,
    ) -> Result<HilSession, TransformError> {
        let bytes = self
            .service
            .download_result_archive(job_id, artifact)
            .await?;

        tokio::fs::create_dir_all(self.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix("hil-")
            .tempdir_in(self.work_dir)?;
        let root = dir.path().to_path_buf();
        let extracted = root.join("artifact");
        {
            let dest = extracted.clone();
            tokio::task::spawn_blocking(move || archive::extract_archive(&bytes, &dest))
                .await
                .map_err(|e| TransformError::Packaging(format!("extraction task failed: {e}")))??;
        }

        let raw = tokio::fs::read_to_string(extracted.join(MANIFEST_FILE))
            .await
            .map_err(|e| TransformError::InvalidManifest(format!("{MANIFEST_FILE}: {e}")))?;
        let manifest: DependencyManifest = serde_json::from_str(&raw)
            .map_err(|e| TransformError::InvalidManifest(e.to_string()))?;

        let pom_file = extracted.join(POM_FILE);
        let pom = tokio::fs::read_to_string(&pom_file)
            .await
            .map_err(|e| TransformError::InvalidManifest(format!("{POM_FILE}: {e}")))?;
        let working = maven::rewrite_dependency_version(
            &pom,
            &manifest.pom_group_id,
            &manifest.pom_artifact_id,
            &manifest.source_pom_version,
        )
        .ok_or_else(|| {
            TransformError::InvalidManifest(format!(
                "{}:{} is not declared with a version in {POM_FILE}",
                manifest.pom_group_id, manifest.pom_artifact_id
            ))
        })?;

        let working_dir = root.join("working");
        tokio::fs::create_dir_all(&working_dir).await?;
        let new_pom_file = working_dir.join(POM_FILE);
        tokio::fs::write(&new_pom_file, working).await?;

        debug!(
            job_id,
            capability = %manifest.hil_capability,
            artifact = %manifest.pom_artifact_id,
            dir = %root.display(),
            "dependency session opened"
        );
        Ok(HilSession {
            _dir: dir,
            root,
            pom_file,
            new_pom_file,
            manifest,
            candidates: VersionCandidates::default(),
        })
    }

    async fn await_choice(
        &mut self,
        job_id: &str,
        session: &HilSession,
    ) -> Result<String, TransformError> {
        self.phase = HilPhase::AwaitingUserChoice;
        // Answers typed for an earlier prompt do not count.
        while self.choices.try_recv().is_ok() {}

        self.events.emit(JobEvent::DependencyChoiceRequested {
            job_id: job_id.to_string(),
            dependency: format!(
                "{}:{}",
                session.manifest.pom_group_id, session.manifest.pom_artifact_id
            ),
            current_version: session.manifest.source_pom_version.clone(),
            candidates: session.candidates.clone(),
        });

        loop {
            let choice = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransformError::Cancelled),
                choice = self.choices.recv() => choice,
            };
            let version = match choice {
                Some(DependencyChoice::Version(version)) => version,
                Some(DependencyChoice::Declined) => {
                    info!(job_id, "dependency choice declined");
                    return Err(TransformError::DependencyChoiceDeclined);
                }
                None => return Err(TransformError::ControlClosed),
            };
            let version = version.trim();
            if session.candidates.contains(version) {
                info!(job_id, version, "dependency version chosen");
                return Ok(version.to_string());
            }
            warn!(job_id, version, "ignoring version outside the offered candidates");
            self.events.emit(JobEvent::DependencyChoiceIgnored {
                version: version.to_string(),
            });
        }
    }

    async fn apply_choice(
        &self,
        job_id: &str,
        session: &HilSession,
        version: &str,
    ) -> Result<(), TransformError> {
        let manifest = &session.manifest;
        let pom = tokio::fs::read_to_string(&session.pom_file).await?;
        let updated = maven::rewrite_dependency_version(
            &pom,
            &manifest.pom_group_id,
            &manifest.pom_artifact_id,
            version,
        )
        .ok_or_else(|| {
            TransformError::InvalidManifest(format!(
                "{}:{} disappeared from {POM_FILE}",
                manifest.pom_group_id, manifest.pom_artifact_id
            ))
        })?;
        tokio::fs::write(&session.new_pom_file, updated).await?;

        let payload = session.root.join("dependencies.zip");
        let files = vec![(format!("sources/{POM_FILE}"), session.new_pom_file.clone())];
        let upgrade = PayloadManifest::for_dependency_upgrade(&manifest.pom_artifact_id, version);
        let dest = payload.clone();
        tokio::task::spawn_blocking(move || archive::package_files(&files, &upgrade, &dest))
            .await
            .map_err(|e| TransformError::Packaging(format!("packaging task failed: {e}")))??;

        self.uploader
            .upload_dependencies(self.service, &payload, job_id)
            .await?;
        Ok(())
    }
}

/// First progress update that names a downloadable artifact. An artifact with
/// a missing id or type counts as no artifact.
fn find_artifact(plan: &TransformationPlan) -> Option<ArtifactRef> {
    let artifact = plan
        .steps
        .iter()
        .flat_map(|step| step.progress_updates.iter())
        .flat_map(|update| update.download_artifacts.iter())
        .next()?;
    Some(ArtifactRef {
        id: artifact.download_artifact_id.clone()?,
        kind: artifact.download_artifact_type.clone()?,
    })
}
