//! # DAQ Sequencer
//!
//! Orchestration engine for laboratory experiments. Work is expressed as a tree of
//! actions (simple steps, measurements with retry, parameter sweeps) run in order by an
//! [`ActionQueue`], with cooperative stop/resume and change notification on every
//! observable property.
//!
//! ## Crate Structure
//!
//! - **`action`**: The `Action` handle and its three variants, status lifecycle,
//!   attributes, listeners, result tables and cooperative cancellation.
//! - **`queue`**: `ActionQueue`, the ordered top-level runner with pre/post hook queues,
//!   current-action tracking and a message log.
//! - **`config`**: Layered configuration (defaults, TOML file, `DAQ_SEQ_` environment)
//!   loaded with figment.
//! - **`error`**: `SequencerError` for engine misuse and `PayloadError` for payload outcomes.
//! - **`logging`**: tracing subscriber setup.
//! - **`mock`**: Simulated stage and meter used by the CLI demo and tests.
//!
//! ## Example
//!
//! ```no_run
//! use daq_sequencer::{Action, ActionQueue, SweepValue};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sweep = Action::sweep("Wavelength");
//! let handle = sweep.as_sweep().cloned().ok_or("not a sweep")?;
//! handle.set_values(SweepValue::linear(700.0, 900.0, 5))?;
//! handle.add_template(Action::wait(Duration::from_millis(100)))?;
//!
//! let queue = ActionQueue::new();
//! queue.add_action(sweep)?;
//! let outcome = queue.start()?;
//! println!("Queue finished: {}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod queue;

pub use action::{
    Action, ActionKind, ActionSnapshot, Attributes, ListenerId, Measurement, MeasurementAction,
    ResultTable, RunContext, SimpleAction, Status, StopPolicy, SweepAction, SweepValue,
};
pub use config::SequencerConfig;
pub use error::{ActionFailure, PayloadError, SequencerError, SequencerResult};
pub use queue::{ActionQueue, MessageLevel, QueueMessage, QueueOutcome};
