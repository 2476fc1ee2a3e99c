//! Cooperative cancellation.
//!
//! A stop request never interrupts a thread. It raises a [`StopSignal`] that the
//! running payload observes through its [`RunContext`] at natural suspension points
//! (`check()`, `sleep()`), and the waiting side polls the action's status with the
//! bound given by a [`StopPolicy`].

use super::Action;
use crate::error::PayloadError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

// =============================================================================
// Stop Signal
// =============================================================================

/// Shared flag raised by a stop request.
#[derive(Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl StopSignal {
    /// Create a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.
    pub fn trigger(&self, reason: impl Into<String>) {
        self.flag.store(true, Ordering::SeqCst);
        *self.reason.lock() = Some(reason.into());
    }

    /// Whether the signal is raised.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Reason given by the last `trigger`.
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Lower the signal.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
        *self.reason.lock() = None;
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("triggered", &self.is_triggered())
            .field("reason", &self.reason())
            .finish()
    }
}

// =============================================================================
// Stop Policy
// =============================================================================

/// Bound on how long `Action::stop` waits for an action to leave its active states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Number of polls before giving up.
    pub max_polls: u32,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            max_polls: 500,
        }
    }
}

impl StopPolicy {
    /// Upper bound of the whole wait.
    pub fn timeout(&self) -> Duration {
        self.poll_interval
            .checked_mul(self.max_polls)
            .unwrap_or(Duration::MAX)
    }
}

// =============================================================================
// Run Context
// =============================================================================

/// Handed to every payload for the duration of one run.
pub struct RunContext {
    action: Action,
    stop: StopSignal,
}

impl RunContext {
    pub(crate) fn new(action: Action, stop: StopSignal) -> Self {
        Self { action, stop }
    }

    /// The action being run.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }

    /// Return `Err(Cancelled)` if a stop was requested.
    pub fn check(&self) -> Result<(), PayloadError> {
        if self.is_stopped() {
            Err(PayloadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning `Err(Cancelled)` as soon as a stop is requested.
    pub fn sleep(&self, duration: Duration) -> Result<(), PayloadError> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    /// Publish a progress message on the running action.
    pub fn set_status_message(&self, message: impl Into<String>) {
        self.action.set_status_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_trigger_and_reset() {
        let signal = StopSignal::new();
        let shared = signal.clone();
        assert!(!signal.is_triggered());

        shared.trigger("operator");
        assert!(signal.is_triggered());
        assert_eq!(signal.reason().as_deref(), Some("operator"));

        signal.reset();
        assert!(!shared.is_triggered());
        assert_eq!(shared.reason(), None);
    }

    #[test]
    fn test_policy_timeout() {
        let policy = StopPolicy {
            poll_interval: Duration::from_millis(20),
            max_polls: 5,
        };
        assert_eq!(policy.timeout(), Duration::from_millis(100));
        assert_eq!(StopPolicy::default().timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_returns_early_when_stopped() {
        let action = Action::simple("idle", |_| Ok(()));
        let signal = StopSignal::new();
        let ctx = RunContext::new(action, signal.clone());

        let trigger = signal.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            trigger.trigger("test");
        });

        let started = Instant::now();
        let result = ctx.sleep(Duration::from_secs(10));
        handle.join().unwrap();

        assert!(matches!(result, Err(PayloadError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_completes_without_stop() {
        let ctx = RunContext::new(Action::simple("idle", |_| Ok(())), StopSignal::new());
        assert!(ctx.sleep(Duration::from_millis(15)).is_ok());
        assert!(ctx.check().is_ok());
    }
}
