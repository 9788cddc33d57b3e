use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::TransformConfig;
use crate::control::{CancelHandle, JobControl, JobSlot};
use crate::error::TransformError;
use crate::events::{EventSink, JobEvent};
use crate::hil::{DependencyChoice, DependencyTool, HilController, HilResolution};
use crate::job::{
    JobState, JobStatus, LoopState, PlanStep, RunSummary, StepProgress, TransformRequest,
};
use crate::messages;
use crate::polling::{JOB_COMPLETE, PLAN_READY, PollPolicy, PollingEngine};
use crate::refresher::{ProgressRefresher, Snapshot};
use crate::remote::{RemoteStatus, ResumeOutcome, StatusReport, TransformService};
use crate::stages::{SubmissionStage, UploadStage, throw_if_cancelled};

const BUILD_LOG_FILE: &str = "build-logs.txt";

/// Drives one transformation job at a time from upload to cleanup.
///
/// ```text
/// upload → submit → poll(plan) → loop { poll(complete) ↔ resolve dependency }
///        → finalize → cleanup
/// ```
pub struct Orchestrator<S, T> {
    service: Arc<S>,
    tool: T,
    config: TransformConfig,
    state: JobState,
    events: EventSink,
    cancel: CancelHandle,
    slot: JobSlot,
    control: JobControl<S>,
    choices: mpsc::UnboundedReceiver<DependencyChoice>,
    snapshot: watch::Sender<Snapshot>,
    refresher: Option<ProgressRefresher>,
    cleaned_up: bool,
}

impl<S: TransformService, T: DependencyTool> Orchestrator<S, T> {
    pub fn new(service: Arc<S>, tool: T, config: TransformConfig, events: EventSink) -> Self {
        let cancel = CancelHandle::new();
        let (choice_tx, choices) = mpsc::unbounded_channel();
        let control = JobControl::new(Arc::clone(&service), cancel.clone(), choice_tx);
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            service,
            tool,
            config,
            state: JobState::default(),
            events,
            cancel,
            slot: JobSlot::new(),
            control,
            choices,
            snapshot,
            refresher: None,
            cleaned_up: true,
        }
    }

    /// Share the single-run slot with other orchestrators in the process.
    #[cfg(test)]
    pub fn with_slot(mut self, slot: JobSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn control(&self) -> JobControl<S> {
        self.control.clone()
    }

    #[cfg(test)]
    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Run a transformation to its terminal disposition.
    ///
    /// Only [`TransformError::JobAlreadyActive`] is returned as an error; every
    /// other failure is folded into the summary's outcome and copy.
    pub async fn run(&mut self, request: TransformRequest) -> Result<RunSummary, TransformError> {
        let _slot = self
            .slot
            .try_acquire()
            .ok_or(TransformError::JobAlreadyActive)?;
        let cancel = self.cancel.renew();

        self.cleaned_up = false;
        self.state.begin(&request);
        info!(
            project = %request.project_path.display(),
            kind = %request.transformation_type,
            source = %request.source_version,
            target = %request.target_version,
            "transformation run started"
        );
        self.events.emit(JobEvent::StatusChanged {
            status: self.state.status(),
        });
        self.publish_snapshot();
        self.refresher = Some(ProgressRefresher::spawn(
            self.config.progress_refresh(),
            self.snapshot.subscribe(),
            self.events.clone(),
        ));

        let result = self.drive(&cancel).await;
        self.finalize(result, &cancel).await;

        let summary = RunSummary::capture(&self.state);
        info!(
            job_id = %summary.job_id,
            outcome = ?summary.outcome,
            duration_ms = summary.duration_ms,
            "transformation run finished"
        );
        self.events.emit(JobEvent::Finished {
            outcome: summary.outcome,
        });

        self.cleanup().await;
        Ok(summary)
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<RemoteStatus, TransformError> {
        let service = Arc::clone(&self.service);
        let uploader = UploadStage::new(self.config.work_dir.clone(), self.config.upload_cooldown());

        throw_if_cancelled(cancel)?;
        let handle = uploader.upload(&*service, &mut self.state).await?;
        self.state.upload_id = handle.upload_id.clone();
        self.set_step(PlanStep::UploadCode, StepProgress::Succeeded);
        throw_if_cancelled(cancel)?;

        let job_id = SubmissionStage::new(self.config.start_cooldown())
            .start(&*service, &mut self.state, &handle, cancel)
            .await?;
        self.events.emit(JobEvent::JobStarted {
            job_id: job_id.clone(),
        });
        self.publish_snapshot();

        let plan_engine = PollingEngine::new(PollPolicy {
            interval: self.config.poll_interval(),
            timeout: self.config.plan_timeout(),
        });
        let report = plan_engine
            .poll(&*service, &job_id, &PLAN_READY, cancel)
            .await?;
        self.observe(&job_id, &report.status);

        if report.status.is_failure() {
            if let Some(reason) = report.reason.as_deref().filter(|r| !r.trim().is_empty()) {
                let log_path = self.write_build_log(reason).await?;
                return Err(TransformError::PreBuildFailure {
                    job_id,
                    reason: reason.to_string(),
                    log_path,
                });
            }
            return Ok(report.status);
        }
        self.set_step(PlanStep::BuildCode, StepProgress::Succeeded);
        self.set_step(PlanStep::GeneratePlan, StepProgress::Succeeded);

        let mut loop_state = LoopState::after_plan(&report.status);
        loop {
            debug!(job_id = %job_id, state = %loop_state, "completion loop");
            loop_state = match loop_state {
                LoopState::Terminal(status) => return Ok(status),
                LoopState::Polling => {
                    let report = self.poll_until_complete(&*service, &job_id, cancel).await?;
                    LoopState::after_poll(report.status)
                }
                LoopState::Paused => {
                    self.resolve_pause(&*service, &uploader, &job_id, cancel)
                        .await?;
                    LoopState::Resuming
                }
                LoopState::Resuming => {
                    self.set_status(JobStatus::Running);
                    LoopState::Polling
                }
            };
        }
    }

    /// Completion poll with caller-side retry of transport failures.
    async fn poll_until_complete(
        &self,
        service: &S,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusReport, TransformError> {
        let engine = PollingEngine::new(PollPolicy {
            interval: self.config.poll_interval(),
            timeout: self.config.job_timeout(),
        });
        let retry = self.config.retry_config();
        let mut attempt = 0;

        loop {
            match engine.poll(service, job_id, &JOB_COMPLETE, cancel).await {
                Ok(report) => {
                    self.observe(job_id, &report.status);
                    return Ok(report);
                }
                Err(err @ TransformError::PollTransport { .. }) if attempt < retry.max_retries => {
                    attempt += 1;
                    let mut delay = retry.delay_for_attempt(attempt);
                    if let TransformError::PollTransport { source, .. } = &err
                        && let Some(wait) = source.retry_after()
                    {
                        delay = delay.max(wait);
                    }
                    warn!(
                        job_id,
                        attempt,
                        max = retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "status query failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TransformError::Cancelled),
                        _ = sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One pass through dependency resolution for a paused job.
    async fn resolve_pause(
        &mut self,
        service: &S,
        uploader: &UploadStage,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransformError> {
        self.set_status(JobStatus::Paused);

        let max = self.config.max_hil_attempts;
        if self.state.hil_attempts >= max {
            warn!(job_id, attempts = self.state.hil_attempts, "dependency resolution budget spent");
            if let Err(e) = service.resume_job(job_id, ResumeOutcome::Rejected).await {
                warn!(job_id, error = %e, "failed to release paused job");
            }
            return Err(TransformError::HilAttemptsExhausted {
                attempts: self.state.hil_attempts,
            });
        }
        self.state.hil_attempts += 1;
        let attempt = self.state.hil_attempts;
        info!(job_id, attempt, max, "job paused for dependency resolution");

        let mut controller = HilController::new(
            service,
            &self.tool,
            uploader,
            &self.events,
            cancel,
            &mut self.choices,
            &self.config.work_dir,
        );
        let resolution = controller.run(job_id).await;
        let phase = controller.phase();

        match resolution {
            HilResolution::Resumed { version } => {
                debug!(job_id, attempt, %phase, version = %version, "dependency attempt resumed job");
            }
            HilResolution::Rejected {
                error: TransformError::Cancelled,
            } => return Err(TransformError::Cancelled),
            HilResolution::Rejected { error } => {
                info!(job_id, attempt, %phase, error = %error, "dependency attempt released job");
            }
        }
        Ok(())
    }

    async fn finalize(
        &mut self,
        result: Result<RemoteStatus, TransformError>,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() || matches!(result, Err(TransformError::Cancelled)) {
            self.state
                .replace_failure(messages::CANCELLED_NOTIFICATION, messages::CANCELLED_CHAT);
            self.set_status(JobStatus::Cancelled);
            self.fail_unfinished_steps();

            let job_id = self.state.job_id.clone();
            if !job_id.is_empty() {
                match self.service.stop_job(&job_id).await {
                    Ok(()) => info!(job_id = %job_id, "remote job stopped"),
                    Err(e) => warn!(job_id = %job_id, error = %e, "failed to stop remote job"),
                }
            }
            self.notify_failure();
            return;
        }

        match result {
            Ok(RemoteStatus::Completed) => {
                self.succeed(JobStatus::Succeeded, messages::SUCCEEDED_NOTIFICATION);
            }
            Ok(RemoteStatus::PartiallyCompleted) => self.succeed(
                JobStatus::PartiallySucceeded,
                messages::PARTIALLY_SUCCEEDED_NOTIFICATION,
            ),
            Ok(status) => {
                warn!(job_id = %self.state.job_id, status = %status, "job ended without completing");
                self.fail(None);
            }
            Err(err) => {
                error!(job_id = %self.state.job_id, error = %err, "transformation failed");
                self.fail(Some(&err));
            }
        }
    }

    fn succeed(&mut self, status: JobStatus, notification: &str) {
        self.set_step(PlanStep::TransformCode, StepProgress::Succeeded);
        self.set_status(status);
        self.events.emit(JobEvent::Notification {
            message: notification.to_string(),
            chat_message: notification.to_string(),
        });
    }

    fn fail(&mut self, err: Option<&TransformError>) {
        if let Some((notification, chat)) = err.and_then(TransformError::failure_messages) {
            self.state.set_failure(notification, chat);
        }
        self.state
            .set_failure(messages::JOB_FAILED_NOTIFICATION, messages::JOB_FAILED_CHAT);
        self.set_status(JobStatus::Failed);
        self.fail_unfinished_steps();
        self.notify_failure();
    }

    /// Release everything the run holds. Safe to call more than once.
    pub async fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        if let Some(mut refresher) = self.refresher.take()
            && refresher.stop()
        {
            debug!("progress refresher released");
        }

        let files = [
            self.state.payload_file_path.take(),
            self.state.build_log_path.take(),
        ];
        for path in files.into_iter().flatten() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed run file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove run file"),
            }
        }

        while self.choices.try_recv().is_ok() {}
        self.state.reset();
        self.publish_snapshot();
        self.events.emit(JobEvent::CleanedUp);
    }

    async fn write_build_log(&mut self, reason: &str) -> Result<PathBuf, TransformError> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let path = self.config.work_dir.join(BUILD_LOG_FILE);
        tokio::fs::write(&path, reason).await?;
        self.state.build_log_path = Some(path.clone());
        Ok(path)
    }

    fn set_status(&mut self, next: JobStatus) {
        let previous = self.state.status();
        if !self.state.set_status(next) {
            debug!(from = %previous, to = %next, "ignored status change");
            return;
        }
        if previous != next {
            self.events.emit(JobEvent::StatusChanged { status: next });
            self.publish_snapshot();
        }
    }

    fn set_step(&mut self, step: PlanStep, progress: StepProgress) {
        self.state.set_step(step, progress);
        self.events.emit(JobEvent::StepChanged { step, progress });
    }

    fn fail_unfinished_steps(&mut self) {
        for step in self.state.fail_unfinished_steps() {
            self.events.emit(JobEvent::StepChanged {
                step,
                progress: StepProgress::Failed,
            });
        }
    }

    fn notify_failure(&self) {
        if let (Some(message), Some(chat)) = (
            self.state.failure_notification(),
            self.state.failure_chat_message(),
        ) {
            self.events.emit(JobEvent::Notification {
                message: message.to_string(),
                chat_message: chat.to_string(),
            });
        }
    }

    fn observe(&self, job_id: &str, status: &RemoteStatus) {
        debug!(job_id, status = %status, "remote status observed");
        self.events.emit(JobEvent::RemoteStatusObserved {
            job_id: job_id.to_string(),
            status: status.clone(),
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(Snapshot {
            job_id: self.state.job_id.clone(),
            status: self.state.status(),
        });
    }
}
