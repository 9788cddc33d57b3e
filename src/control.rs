//! Handles shared between a running orchestrator and the outside world.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::TransformError;
use crate::hil::DependencyChoice;
use crate::remote::TransformService;

/// Cancellation token for the current run. Each run gets a fresh token, so a
/// cancel aimed at a finished run never leaks into the next one.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cancel(&self) {
        self.lock().cancel();
    }

    /// Replace the token and return the new one.
    pub fn renew(&self) -> CancellationToken {
        let mut token = self.lock();
        *token = CancellationToken::new();
        token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().is_cancelled()
    }

    /// The token of the current run.
    pub fn token(&self) -> CancellationToken {
        self.lock().clone()
    }
}

/// Single-occupancy slot; at most one run holds it at a time.
#[derive(Debug, Clone, Default)]
pub struct JobSlot {
    busy: Arc<AtomicBool>,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: Arc::clone(&self.busy),
            })
    }
}

/// Releases the slot on drop.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Cloneable entry point for stopping a run or answering a dependency prompt
/// while [`Orchestrator::run`](crate::orchestrator::Orchestrator::run) is in flight.
pub struct JobControl<S> {
    service: Arc<S>,
    cancel: CancelHandle,
    choices: mpsc::UnboundedSender<DependencyChoice>,
}

impl<S> Clone for JobControl<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cancel: self.cancel.clone(),
            choices: self.choices.clone(),
        }
    }
}

impl<S: TransformService> JobControl<S> {
    pub fn new(
        service: Arc<S>,
        cancel: CancelHandle,
        choices: mpsc::UnboundedSender<DependencyChoice>,
    ) -> Self {
        Self {
            service,
            cancel,
            choices,
        }
    }

    /// Control with no run attached, for jobs started by another process.
    pub fn detached(service: Arc<S>) -> Self {
        let (choices, _) = mpsc::unbounded_channel();
        Self::new(service, CancelHandle::new(), choices)
    }

    /// Cancel the in-flight run and ask the service to stop `job_id`.
    pub async fn stop(&self, job_id: &str) -> Result<(), TransformError> {
        info!(job_id, "stop requested");
        self.cancel.cancel();
        if job_id.is_empty() {
            return Ok(());
        }
        self.service.stop_job(job_id).await?;
        Ok(())
    }

    /// Cancel the in-flight run without contacting the service.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("cancellation requested");
        }
        self.cancel.cancel();
    }

    pub fn submit_user_dependency_choice(
        &self,
        version: impl Into<String>,
    ) -> Result<(), TransformError> {
        self.send(DependencyChoice::Version(version.into()))
    }

    /// Keep the current dependency version. Only the pending attempt ends;
    /// the run carries on.
    pub fn decline_dependency_choice(&self) -> Result<(), TransformError> {
        self.send(DependencyChoice::Declined)
    }

    fn send(&self, choice: DependencyChoice) -> Result<(), TransformError> {
        self.choices
            .send(choice)
            .map_err(|_| TransformError::ControlClosed)
    }

    /// Token of the current run; resolves once it is cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.token()
    }

    #[cfg(test)]
    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }
}
