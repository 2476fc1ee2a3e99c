//! Measurement variant: an external long-running operation with bounded retry.
//!
//! Each attempt gets a fresh [`ResultTable`] carrying every attribute of the action,
//! including attributes set while the attempt runs. The attempt loop ends on the first
//! success, on cancellation, on a critical failure, or once `retry_count` attempts
//! have been made.

use super::{run_guarded, Action, ActionCore, ResultNamer, ResultTable, RunContext, Status};
use crate::error::PayloadError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// External long-running operation driven by a [`MeasurementAction`].
pub trait Measurement: Send + Sync {
    /// Display name, used as the initial action name and result label.
    fn name(&self) -> String;

    /// Column names of the result table.
    fn columns(&self) -> Vec<String>;

    /// Perform one attempt, appending rows to `results`.
    ///
    /// Long waits should go through `ctx.sleep()` / `ctx.check()` so that a stop
    /// request surfaces as `PayloadError::Cancelled`.
    fn run(&self, ctx: &RunContext, results: &ResultTable) -> Result<(), PayloadError>;

    /// Called on every stop request; use it to interrupt blocking hardware calls.
    fn abort(&self) {}
}

/// Action that runs a [`Measurement`] with bounded retry.
pub struct MeasurementAction {
    pub(crate) core: ActionCore,
    measurement: Arc<dyn Measurement>,
    namer: Mutex<Option<ResultNamer>>,
    retry_count: AtomicU32,
    attempts: AtomicU32,
    results: Mutex<Option<Arc<ResultTable>>>,
}

impl MeasurementAction {
    /// Wrap `measurement`; one attempt, results kept in memory.
    pub fn new(measurement: Arc<dyn Measurement>) -> Self {
        Self {
            core: ActionCore::new(measurement.name()),
            measurement,
            namer: Mutex::new(None),
            retry_count: AtomicU32::new(1),
            attempts: AtomicU32::new(0),
            results: Mutex::new(None),
        }
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self {
            core: self.core.duplicate(),
            measurement: Arc::clone(&self.measurement),
            namer: Mutex::new(self.namer.lock().clone()),
            retry_count: AtomicU32::new(self.retry_count()),
            attempts: AtomicU32::new(0),
            results: Mutex::new(None),
        }
    }

    /// The wrapped measurement.
    pub fn measurement(&self) -> &Arc<dyn Measurement> {
        &self.measurement
    }

    /// Maximum number of attempts per run.
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// Set the maximum number of attempts per run (at least one).
    pub fn set_retry_count(&self, count: u32) {
        self.retry_count.store(count.max(1), Ordering::SeqCst);
    }

    /// Attempts made by the last run.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Choose where result tables are persisted. `None` keeps them in memory.
    pub fn set_result_namer(&self, namer: Option<ResultNamer>) {
        *self.namer.lock() = namer;
    }

    /// Result table of the latest attempt.
    pub fn results(&self) -> Option<Arc<ResultTable>> {
        self.results.lock().clone()
    }

    pub(crate) fn abort(&self) {
        self.measurement.abort();
    }

    pub(crate) fn mirror_attribute(&self, key: &str, value: Option<&str>) {
        if let Some(table) = self.results() {
            match value {
                Some(value) => table.set_attribute(key, value),
                None => table.remove_attribute(key),
            }
        }
    }

    fn prepare_table(&self, action: &Action) -> Arc<ResultTable> {
        let label = action.name();
        let namer = self.namer.lock().clone();
        let destination = namer.and_then(|namer| namer(&action.attributes(), &label));

        let mut table = ResultTable::new(label, self.measurement.columns());
        if let Some(path) = destination {
            table = table.with_destination(path);
        }
        let table = Arc::new(table);

        // Publish before copying so attributes set concurrently are mirrored either way.
        *self.results.lock() = Some(Arc::clone(&table));
        for (key, value) in action.attributes().iter() {
            table.set_attribute(key, value);
        }
        table
    }

    fn attempt(&self, action: &Action) -> Result<(), PayloadError> {
        let table = self.prepare_table(action);
        let ctx = RunContext::new(action.clone(), self.core.stop.clone());
        let outcome = run_guarded(|| self.measurement.run(&ctx, &table));

        match (outcome, table.finalise()) {
            (outcome, Ok(())) => outcome,
            (Ok(()), Err(e)) => Err(PayloadError::Failed(
                anyhow::Error::new(e).context("writing results"),
            )),
            (outcome, Err(e)) => {
                tracing::warn!(error = %e, "Failed to write results of an unsuccessful attempt");
                outcome
            }
        }
    }

    pub(crate) fn execute(&self, action: &Action) {
        let retries = self.retry_count();
        self.attempts.store(0, Ordering::SeqCst);

        for attempt in 1..=retries {
            if attempt > 1 {
                if self.core.stop.is_triggered() {
                    action.force_status(Status::Interrupted);
                    return;
                }
                action.force_status(Status::Retry);
            }
            self.attempts.store(attempt, Ordering::SeqCst);

            match self.attempt(action) {
                Ok(()) => {
                    action.force_status(Status::Completed);
                    return;
                }
                Err(PayloadError::Cancelled) => {
                    action.force_status(Status::Interrupted);
                    return;
                }
                Err(PayloadError::Failed(cause)) => {
                    let message = format!("{cause:#}");
                    action.record_failure(cause);

                    if self.core.stop.is_triggered() {
                        action.force_status(Status::Interrupted);
                        return;
                    }
                    action.force_status(Status::Error);

                    if self.core.is_critical() {
                        return;
                    }
                    if attempt < retries {
                        tracing::warn!(attempt, retries, error = %message, "Measurement attempt failed; retrying");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::pattern_namer;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Fails its first `failures` attempts, then records one row.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Measurement for Flaky {
        fn name(&self) -> String {
            "IV Sweep".to_string()
        }

        fn columns(&self) -> Vec<String> {
            vec!["V".to_string(), "I".to_string()]
        }

        fn run(&self, _ctx: &RunContext, results: &ResultTable) -> Result<(), PayloadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(PayloadError::failed(format!("attempt {} failed", call + 1)));
            }
            results.add_row([1.0, 1e-6])?;
            Ok(())
        }
    }

    fn statuses(action: &Action) -> Arc<Mutex<Vec<Status>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        action.add_status_listener(move |a| sink.lock().push(a.status()));
        seen
    }

    #[test]
    fn test_single_attempt_by_default() {
        let action = Action::measurement(Flaky::new(1));
        assert_eq!(action.start().unwrap(), Status::Error);

        let measurement = action.as_measurement().unwrap();
        assert_eq!(measurement.attempts(), 1);
        assert_eq!(action.error().unwrap().message(), "attempt 1 failed");
    }

    #[test]
    fn test_retry_until_success() {
        let action = Action::measurement(Flaky::new(2));
        action.as_measurement().unwrap().set_retry_count(3);
        let seen = statuses(&action);

        assert_eq!(action.start().unwrap(), Status::Completed);
        assert_eq!(action.as_measurement().unwrap().attempts(), 3);
        assert_eq!(
            *seen.lock(),
            vec![
                Status::Running,
                Status::Error,
                Status::Retry,
                Status::Error,
                Status::Retry,
                Status::Completed
            ]
        );
        assert_eq!(action.results()[0].row_count(), 1);
    }

    #[test]
    fn test_retry_bound_is_respected() {
        let action = Action::measurement(Flaky::new(usize::MAX));
        let measurement = Arc::clone(action.as_measurement().unwrap());
        measurement.set_retry_count(4);

        assert_eq!(action.start().unwrap(), Status::Error);
        assert_eq!(measurement.attempts(), 4);
        assert_eq!(action.error().unwrap().message(), "attempt 4 failed");
    }

    #[test]
    fn test_critical_failure_stops_retrying() {
        let action = Action::measurement(Flaky::new(usize::MAX));
        action.as_measurement().unwrap().set_retry_count(5);
        action.set_critical(true);

        assert_eq!(action.start().unwrap(), Status::Error);
        assert_eq!(action.as_measurement().unwrap().attempts(), 1);
    }

    #[test]
    fn test_zero_retry_count_means_one_attempt() {
        let action = Action::measurement(Flaky::new(0));
        action.as_measurement().unwrap().set_retry_count(0);
        assert_eq!(action.as_measurement().unwrap().retry_count(), 1);
        assert_eq!(action.start().unwrap(), Status::Completed);
    }

    struct Slow;

    impl Measurement for Slow {
        fn name(&self) -> String {
            "Slow".to_string()
        }

        fn columns(&self) -> Vec<String> {
            vec!["t".to_string()]
        }

        fn run(&self, ctx: &RunContext, results: &ResultTable) -> Result<(), PayloadError> {
            ctx.action().set_attribute("Phase", "acquiring");
            for i in 0..1000 {
                results.add_row([i as f64])?;
                ctx.sleep(Duration::from_millis(5))?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_cancellation_is_not_retried() {
        let action = Action::measurement(Slow);
        action.as_measurement().unwrap().set_retry_count(3);

        let stopper = action.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(40));
            stopper.stop()
        });

        assert_eq!(action.start().unwrap(), Status::Interrupted);
        assert!(handle.join().unwrap());
        assert_eq!(action.as_measurement().unwrap().attempts(), 1);
    }

    #[test]
    fn test_attributes_mirrored_onto_results() {
        let action = Action::measurement(Flaky::new(0));
        action.set_attribute("Sample", "S1");
        action.start().unwrap();

        let table = action.as_measurement().unwrap().results().unwrap();
        assert_eq!(table.attribute("Sample").as_deref(), Some("S1"));
        assert_eq!(table.label(), "IV Sweep");

        action.set_attribute("Note", "after run");
        assert_eq!(table.attribute("Note").as_deref(), Some("after run"));
        action.remove_attribute("Sample");
        assert_eq!(table.attribute("Sample"), None);
    }

    #[test]
    fn test_attribute_set_during_run_reaches_results() {
        let action = Action::measurement(Slow);
        let stopper = action.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            stopper.stop()
        });

        action.start().unwrap();
        handle.join().unwrap();

        let table = action.as_measurement().unwrap().results().unwrap();
        assert_eq!(table.attribute("Phase").as_deref(), Some("acquiring"));
    }

    #[test]
    fn test_results_written_through_namer() {
        let dir = tempfile::tempdir().unwrap();
        let template = format!("{}/{{label}}-{{attributes}}.csv", dir.path().display());

        let action = Action::measurement(Flaky::new(0));
        action.set_attribute("T", "4 K");
        action
            .as_measurement()
            .unwrap()
            .set_result_namer(Some(pattern_namer(template)));
        action.start().unwrap();

        let path = dir.path().join("IV Sweep-T=4K.csv");
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("# T: 4 K\nV,I\n"));
    }

    #[test]
    fn test_copy_shares_measurement_not_results() {
        let action = Action::measurement(Flaky::new(0));
        action.as_measurement().unwrap().set_retry_count(2);
        action.start().unwrap();

        let copy = action.copy();
        let copied = copy.as_measurement().unwrap();
        assert_eq!(copied.retry_count(), 2);
        assert!(copied.results().is_none());
        assert!(Arc::ptr_eq(
            copied.measurement(),
            action.as_measurement().unwrap().measurement()
        ));
    }
}
