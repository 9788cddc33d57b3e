use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::remote::RemoteStatus;

/// States of the completion loop that alternates between polling and
/// dependency resolution.
///
/// ```text
///   Polling ──(PAUSED)──→ Paused ──(HIL resolved)──→ Resuming ──→ Polling
///      │
///      └──(terminal status)──→ Terminal
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Paused,
    Resuming,
    Terminal(RemoteStatus),
}

impl LoopState {
    /// Entry state once the plan-ready poll has returned.
    pub fn after_plan(status: &RemoteStatus) -> Self {
        if *status == RemoteStatus::Paused {
            LoopState::Paused
        } else if status.is_terminal() {
            LoopState::Terminal(status.clone())
        } else {
            LoopState::Polling
        }
    }

    /// State after the completion poll returns an accepted status.
    pub fn after_poll(status: RemoteStatus) -> Self {
        if status == RemoteStatus::Paused {
            LoopState::Paused
        } else {
            LoopState::Terminal(status)
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Polling => write!(f, "POLLING"),
            LoopState::Paused => write!(f, "PAUSED"),
            LoopState::Resuming => write!(f, "RESUMING"),
            LoopState::Terminal(status) => write!(f, "TERMINAL({status})"),
        }
    }
}

/// Configuration for retrying transient status-query failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries before the failure becomes fatal.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_status_selects_entry_state() {
        assert_eq!(
            LoopState::after_plan(&RemoteStatus::Planned),
            LoopState::Polling
        );
        assert_eq!(
            LoopState::after_plan(&RemoteStatus::Transforming),
            LoopState::Polling
        );
        assert_eq!(
            LoopState::after_plan(&RemoteStatus::Paused),
            LoopState::Paused
        );
        assert_eq!(
            LoopState::after_plan(&RemoteStatus::Completed),
            LoopState::Terminal(RemoteStatus::Completed)
        );
        assert_eq!(
            LoopState::after_plan(&RemoteStatus::Stopped),
            LoopState::Terminal(RemoteStatus::Stopped)
        );
    }

    #[test]
    fn poll_result_pauses_or_terminates() {
        assert_eq!(
            LoopState::after_poll(RemoteStatus::Paused),
            LoopState::Paused
        );
        let t = LoopState::after_poll(RemoteStatus::PartiallyCompleted);
        assert!(matches!(t, LoopState::Terminal(_)));
        assert_eq!(t.to_string(), "TERMINAL(PARTIALLY_COMPLETED)");
    }

    #[test]
    fn retry_config_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1000,
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(8000));
    }

    #[test]
    fn retry_delay_saturates() {
        let config = RetryConfig {
            max_retries: 100,
            base_delay_ms: u64::MAX / 2,
        };
        assert_eq!(config.delay_for_attempt(80), Duration::from_millis(u64::MAX));
    }
}
