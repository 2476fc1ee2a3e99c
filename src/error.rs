//! Error types for the sequencer.
//!
//! Two families of errors exist and they never mix:
//!
//! - **`SequencerError`**: structural problems raised synchronously to the caller.
//!   Mutating a running queue or sweep, addressing an index that does not exist,
//!   driving an action through an illegal status transition, or failing to load
//!   configuration. These indicate a caller bug (or a broken environment) and are
//!   always returned, never swallowed.
//! - **`PayloadError`**: the outcome channel of an action payload. `Cancelled`
//!   becomes status `Interrupted`, `Failed` becomes status `Error` with the cause
//!   stored on the action. The orchestrator only ever reads the resulting status,
//!   it does not re-raise these.
//!
//! `ActionFailure` is the cloneable record of a `Failed` cause kept on the action so
//! that it stays retrievable after the run.

use crate::action::Status;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Convenience alias for results using the sequencer error type.
pub type SequencerResult<T> = std::result::Result<T, SequencerError>;

/// Structural and environment errors.
#[derive(Error, Debug)]
pub enum SequencerError {
    /// Queue mutated or started while a run is in progress
    #[error("Cannot modify an ActionQueue while it is running")]
    QueueRunning,

    /// Sweep reconfigured while it executes, final actions included
    #[error("Cannot modify sweep '{name}' while it is running")]
    SweepRunning {
        /// Sweep name
        name: String,
    },

    /// Action started or reset while a run is in progress
    #[error("Action '{name}' is already running")]
    AlreadyRunning {
        /// Action name
        name: String,
    },

    /// Status change not allowed by the lifecycle
    #[error("Action '{name}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// Action name
        name: String,
        /// Current status
        from: Status,
        /// Requested status
        to: Status,
    },

    /// List index out of bounds
    #[error("Index {index} out of range for {len} entries")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// List length
        len: usize,
    },

    /// Action handle not found in the queue
    #[error("Action '{name}' is not part of this queue")]
    ActionNotInQueue {
        /// Action name
        name: String,
    },

    /// Same action handle added twice
    #[error("Action '{name}' is already part of this queue")]
    DuplicateAction {
        /// Action name
        name: String,
    },

    /// Result row width differs from the column count
    #[error("Row has {got} values but table has {expected} columns")]
    ColumnMismatch {
        /// Table column count
        expected: usize,
        /// Values in the row
        got: usize,
    },

    /// Figment could not load or extract the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but failed validation
    #[error("Configuration validation error: {0}")]
    InvalidConfig(String),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Tracing subscriber could not be installed
    #[error("Failed to initialize tracing: {0}")]
    Logging(String),
}

/// Outcome of a payload that did not complete normally.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// The payload observed a stop request and gave up.
    #[error("cancelled")]
    Cancelled,

    /// Any other failure.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl PayloadError {
    /// Build a `Failed` error from a message.
    pub fn failed(message: impl fmt::Display) -> Self {
        PayloadError::Failed(anyhow::anyhow!("{message}"))
    }

    /// Whether this error represents cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PayloadError::Cancelled)
    }
}

impl From<std::io::Error> for PayloadError {
    fn from(value: std::io::Error) -> Self {
        PayloadError::Failed(value.into())
    }
}

impl From<SequencerError> for PayloadError {
    fn from(value: SequencerError) -> Self {
        PayloadError::Failed(value.into())
    }
}

/// Failure cause recorded on an action that ended in `Error`.
#[derive(Clone)]
pub struct ActionFailure {
    cause: Arc<anyhow::Error>,
}

impl ActionFailure {
    pub(crate) fn new(cause: anyhow::Error) -> Self {
        Self {
            cause: Arc::new(cause),
        }
    }

    /// The underlying error.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Display message of the cause, including its context chain.
    pub fn message(&self) -> String {
        format!("{:#}", self.cause)
    }
}

impl fmt::Debug for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionFailure").field(&self.message()).finish()
    }
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.cause)
    }
}
