//! Action lifecycle status.
//!
//! # State Machine
//!
//! ```text
//! NotStarted ──start()──> Running ──> Completed | Interrupted | Error
//!     │                    │  ▲                                  │
//!     │                    ▼  │                                  │
//!     │                   Retry <──── (bounded retry) ───────────┤
//!     │                    │                                     │
//!     │                    ▼                                     │
//!     │                 Stopping ──> Interrupted | Completed | Error
//!     │                                                          │
//!     └──> Interrupted  (stopped before it began)   resume() ────┘──> Running
//!
//! any ──reset()──> NotStarted
//! ```

use serde::{Deserialize, Serialize};

/// Status of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Queued, has not run since the last reset
    NotStarted,
    /// Payload executing
    Running,
    /// Payload executing again after a failed attempt
    Retry,
    /// Stop requested, waiting for the payload to notice
    Stopping,
    /// Stopped on request
    Interrupted,
    /// Finished normally
    Completed,
    /// Finished with a failure
    Error,
}

impl Status {
    /// Human-readable label.
    pub fn text(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::Running => "Running",
            Status::Retry => "Running (Retry)",
            Status::Stopping => "Stopping",
            Status::Interrupted => "Interrupted",
            Status::Completed => "Completed",
            Status::Error => "Error Encountered",
        }
    }

    /// Whether the action is currently executing (including retry and stopping).
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Running | Status::Retry | Status::Stopping)
    }

    /// Whether this is one of the three terminal outcomes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Interrupted | Status::Completed | Status::Error
        )
    }

    /// Check if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;

        match (*self, next) {
            (_, NotStarted) => true,
            (Running, Running) => false,
            (current, wanted) if current == wanted => true,
            (NotStarted | Completed | Interrupted | Error, Running) => true,
            (NotStarted, Interrupted) => true,
            (Running, Retry | Stopping | Interrupted | Completed | Error) => true,
            (Retry, Running | Stopping | Interrupted | Completed | Error) => true,
            (Error, Retry) => true,
            (Stopping, Interrupted | Completed | Error) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_and_terminal_are_disjoint() {
        let all = [
            Status::NotStarted,
            Status::Running,
            Status::Retry,
            Status::Stopping,
            Status::Interrupted,
            Status::Completed,
            Status::Error,
        ];

        for status in all {
            assert!(!(status.is_active() && status.is_terminal()), "{status}");
        }
        assert!(!Status::NotStarted.is_active());
        assert!(!Status::NotStarted.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(Status::NotStarted.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::Retry));
        assert!(Status::Retry.can_transition_to(Status::Completed));
        assert!(Status::Error.can_transition_to(Status::Retry));
        assert!(Status::Interrupted.can_transition_to(Status::Running));
        assert!(Status::Stopping.can_transition_to(Status::Interrupted));
        assert!(Status::Completed.can_transition_to(Status::NotStarted));

        assert!(!Status::Running.can_transition_to(Status::Running));
        assert!(!Status::NotStarted.can_transition_to(Status::Completed));
        assert!(!Status::NotStarted.can_transition_to(Status::Error));
        assert!(!Status::Completed.can_transition_to(Status::Stopping));
        assert!(!Status::Stopping.can_transition_to(Status::Running));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Status::Retry.to_string(), "Running (Retry)");
        assert_eq!(Status::Error.text(), "Error Encountered");
    }
}
