//! Sweep variant: run a generated sub-action list once per sweep value.
//!
//! A sweep owns a list of values, a list of *template* actions and a generator. Whenever
//! the values, templates, generator or formatter change, the per-value action lists are
//! rebuilt: each template is deep-copied (the copy follows later renames of its
//! template), the generator receives `(value, copies)` and every generated action is
//! tagged with the sweep's attributes plus `<sweep name> = <formatted value>`.
//!
//! # Execution
//!
//! Values run in order and, within a value, actions run in list order. A child ending
//! `Interrupted` interrupts the sweep; a child ending `Error` marks the sweep failed and,
//! if the child is critical, aborts it. The final actions run exactly once per run
//! whichever way the sweep ends.
//!
//! # Resume
//!
//! After an interruption the sweep remembers the value index and the action it was
//! running. `resume()` continues from that action (resuming it once) without re-running
//! earlier values or earlier actions of the same value.

use super::{Action, ActionCore, ListenerId, Status};
use crate::error::{SequencerError, SequencerResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

// =============================================================================
// Sweep Values
// =============================================================================

/// Value a sweep iterates over.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// Text value
    Text(String),
}

impl SweepValue {
    /// `points` evenly spaced floats from `start` to `stop` inclusive.
    pub fn linear(start: f64, stop: f64, points: usize) -> Vec<SweepValue> {
        match points {
            0 => Vec::new(),
            1 => vec![SweepValue::Float(start)],
            n => {
                let step = (stop - start) / (n - 1) as f64;
                (0..n)
                    .map(|i| SweepValue::Float(start + step * i as f64))
                    .collect()
            }
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SweepValue::Integer(v) => Some(*v as f64),
            SweepValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for SweepValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepValue::Bool(v) => write!(f, "{v}"),
            SweepValue::Integer(v) => write!(f, "{v}"),
            SweepValue::Float(v) => write!(f, "{v}"),
            SweepValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for SweepValue {
    fn from(value: bool) -> Self {
        SweepValue::Bool(value)
    }
}

impl From<i32> for SweepValue {
    fn from(value: i32) -> Self {
        SweepValue::Integer(i64::from(value))
    }
}

impl From<i64> for SweepValue {
    fn from(value: i64) -> Self {
        SweepValue::Integer(value)
    }
}

impl From<f64> for SweepValue {
    fn from(value: f64) -> Self {
        SweepValue::Float(value)
    }
}

impl From<&str> for SweepValue {
    fn from(value: &str) -> Self {
        SweepValue::Text(value.to_string())
    }
}

impl From<String> for SweepValue {
    fn from(value: String) -> Self {
        SweepValue::Text(value)
    }
}

// =============================================================================
// Sweep Action
// =============================================================================

/// Builds the action list for one value from fresh copies of the templates.
pub type SweepGenerator = Arc<dyn Fn(&SweepValue, Vec<Action>) -> Vec<Action> + Send + Sync>;

/// Renders a sweep value for attributes and messages.
pub type ValueFormatter = Arc<dyn Fn(&SweepValue) -> String + Send + Sync>;

/// Name-sync listener registered on a template for one of its copies.
struct TemplateLink {
    template: Action,
    listener: ListenerId,
}

struct SweepPlan {
    values: Vec<SweepValue>,
    templates: Vec<Action>,
    generator: SweepGenerator,
    formatter: ValueFormatter,
    generated: Vec<Vec<Action>>,
    final_actions: Vec<Action>,
    links: Vec<TemplateLink>,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            templates: Vec::new(),
            generator: Arc::new(|_: &SweepValue, copies: Vec<Action>| copies),
            formatter: Arc::new(SweepValue::to_string),
            generated: Vec::new(),
            final_actions: Vec::new(),
            links: Vec::new(),
        }
    }
}

#[derive(Default)]
struct SweepProgress {
    last_index: Option<usize>,
    last_action: Option<Action>,
    resumable: bool,
}

/// Action iterating a list of values over generated sub-actions.
pub struct SweepAction {
    pub(crate) core: ActionCore,
    me: Weak<SweepAction>,
    plan: Mutex<SweepPlan>,
    progress: Mutex<SweepProgress>,
}

impl SweepAction {
    /// Empty sweep named `name`.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            core: ActionCore::new(name),
            me: me.clone(),
            plan: Mutex::new(SweepPlan::default()),
            progress: Mutex::new(SweepProgress::default()),
        })
    }

    pub(crate) fn duplicate(&self) -> Arc<Self> {
        let plan = {
            let plan = self.plan.lock();
            SweepPlan {
                values: plan.values.clone(),
                templates: plan.templates.iter().map(Action::copy).collect(),
                generator: Arc::clone(&plan.generator),
                formatter: Arc::clone(&plan.formatter),
                generated: Vec::new(),
                final_actions: plan.final_actions.iter().map(Action::copy).collect(),
                links: Vec::new(),
            }
        };

        let copy = Arc::new_cyclic(|me| Self {
            core: self.core.duplicate(),
            me: me.clone(),
            plan: Mutex::new(plan),
            progress: Mutex::new(SweepProgress::default()),
        });
        copy.regenerate();
        copy
    }

    fn handle(&self) -> Option<Action> {
        self.me.upgrade().map(Action::Sweep)
    }

    fn ensure_idle(&self) -> SequencerResult<()> {
        if self.core.status().is_active() || self.core.is_executing() {
            return Err(SequencerError::SweepRunning {
                name: self.core.name(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Sweep values, in run order.
    pub fn values(&self) -> Vec<SweepValue> {
        self.plan.lock().values.clone()
    }

    /// Replace the sweep values.
    pub fn set_values<I, V>(&self, values: I) -> SequencerResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<SweepValue>,
    {
        self.ensure_idle()?;
        self.plan.lock().values = values.into_iter().map(Into::into).collect();
        self.regenerate();
        Ok(())
    }

    /// Template actions copied for every value.
    pub fn templates(&self) -> Vec<Action> {
        self.plan.lock().templates.clone()
    }

    /// Append a template.
    pub fn add_template(&self, template: impl Into<Action>) -> SequencerResult<()> {
        self.ensure_idle()?;
        self.plan.lock().templates.push(template.into());
        self.regenerate();
        Ok(())
    }

    /// Remove a template. Returns whether it was present.
    pub fn remove_template(&self, template: &Action) -> SequencerResult<bool> {
        self.ensure_idle()?;
        let removed = {
            let mut plan = self.plan.lock();
            let before = plan.templates.len();
            plan.templates.retain(|t| !t.same_as(template));
            plan.templates.len() != before
        };
        if removed {
            self.regenerate();
        }
        Ok(removed)
    }

    /// Remove every template.
    pub fn clear_templates(&self) -> SequencerResult<()> {
        self.ensure_idle()?;
        self.plan.lock().templates.clear();
        self.regenerate();
        Ok(())
    }

    /// Replace the generator, called with `(value, template copies)`.
    pub fn set_generator<F>(&self, generator: F) -> SequencerResult<()>
    where
        F: Fn(&SweepValue, Vec<Action>) -> Vec<Action> + Send + Sync + 'static,
    {
        self.ensure_idle()?;
        self.plan.lock().generator = Arc::new(generator);
        self.regenerate();
        Ok(())
    }

    /// Replace the value formatter.
    pub fn set_formatter<F>(&self, formatter: F) -> SequencerResult<()>
    where
        F: Fn(&SweepValue) -> String + Send + Sync + 'static,
    {
        self.ensure_idle()?;
        self.plan.lock().formatter = Arc::new(formatter);
        self.regenerate();
        Ok(())
    }

    /// Render `value` with the current formatter.
    pub fn format_value(&self, value: &SweepValue) -> String {
        let formatter = Arc::clone(&self.plan.lock().formatter);
        formatter(value)
    }

    /// Actions run after every run of the sweep.
    pub fn final_actions(&self) -> Vec<Action> {
        self.plan.lock().final_actions.clone()
    }

    /// Replace the final actions.
    pub fn set_final_actions(&self, actions: Vec<Action>) -> SequencerResult<()> {
        self.ensure_idle()?;
        self.plan.lock().final_actions = actions;
        Ok(())
    }

    /// Append a final action.
    pub fn add_final_action(&self, action: impl Into<Action>) -> SequencerResult<()> {
        self.ensure_idle()?;
        self.plan.lock().final_actions.push(action.into());
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Generated actions and progress
    // -------------------------------------------------------------------------

    /// Generated actions of every value, flattened in run order.
    pub fn children(&self) -> Vec<Action> {
        self.plan
            .lock()
            .generated
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Generated actions of value `index`.
    pub fn actions_for_value(&self, index: usize) -> Option<Vec<Action>> {
        self.plan.lock().generated.get(index).cloned()
    }

    /// Index of the value that was running most recently.
    pub fn last_index(&self) -> Option<usize> {
        self.progress.lock().last_index
    }

    /// Value that was running most recently.
    pub fn last_value(&self) -> Option<SweepValue> {
        let index = self.last_index()?;
        self.plan.lock().values.get(index).cloned()
    }

    /// Generated action that was running most recently.
    pub fn last_action(&self) -> Option<Action> {
        self.progress.lock().last_action.clone()
    }

    /// Rebuild every per-value action list from the templates.
    pub(crate) fn regenerate(&self) {
        let (values, templates, generator, formatter, stale) = {
            let mut plan = self.plan.lock();
            (
                plan.values.clone(),
                plan.templates.clone(),
                Arc::clone(&plan.generator),
                Arc::clone(&plan.formatter),
                std::mem::take(&mut plan.links),
            )
        };
        for link in stale {
            link.template.remove_listener(link.listener);
        }

        let sweep_name = self.core.name();
        let attributes = self.core.attributes();
        let mut links = Vec::new();
        let mut generated = Vec::with_capacity(values.len());

        for value in &values {
            let mut copies = Vec::with_capacity(templates.len());
            for template in &templates {
                let copy = template.copy();
                let follower = copy.downgrade();
                let listener = template.add_name_listener(move |template| {
                    if let Some(copy) = follower.upgrade() {
                        copy.set_name(template.name());
                    }
                });
                links.push(TemplateLink {
                    template: template.clone(),
                    listener,
                });
                copies.push(copy);
            }

            let actions = generator(value, copies);
            let label = formatter(value);
            for action in &actions {
                for (key, val) in attributes.iter() {
                    action.set_attribute(key, val);
                }
                action.set_attribute(sweep_name.clone(), label.clone());
            }
            generated.push(actions);
        }

        {
            let mut plan = self.plan.lock();
            plan.generated = generated;
            plan.links = links;
        }
        *self.progress.lock() = SweepProgress::default();

        if let Some(handle) = self.handle() {
            handle.notify_children();
        }
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    fn finish(&self, action: &Action, status: Status) {
        action.force_status(status);
        self.progress.lock().resumable = status == Status::Interrupted;
        self.run_final_actions();
        tracing::info!(sweep = %self.core.name(), %status, "Sweep finished");
    }

    fn run_final_actions(&self) {
        for final_action in self.final_actions() {
            if let Err(e) = final_action.reset() {
                tracing::warn!(action = %final_action.name(), error = %e, "Cannot reset final action");
                continue;
            }
            match final_action.start() {
                Ok(Status::Completed) => {}
                Ok(status) => tracing::warn!(
                    action = %final_action.name(),
                    %status,
                    "Final action did not complete"
                ),
                Err(e) => tracing::warn!(
                    action = %final_action.name(),
                    error = %e,
                    "Final action could not be started"
                ),
            }
        }
    }

    pub(crate) fn execute(&self, action: &Action, resume: bool) -> SequencerResult<()> {
        let (values, generated) = {
            let plan = self.plan.lock();
            (plan.values.clone(), plan.generated.clone())
        };
        let name = self.core.name();

        let (start_index, mut resume_from) = {
            let progress = self.progress.lock();
            match progress.last_index {
                Some(index) if resume && progress.resumable && index < generated.len() => {
                    (index, progress.last_action.clone())
                }
                _ => (0, None),
            }
        };

        if resume_from.is_none() {
            for child in generated.iter().flatten() {
                if let Err(e) = child.reset() {
                    tracing::warn!(action = %child.name(), error = %e, "Cannot reset sweep action");
                }
            }
            *self.progress.lock() = SweepProgress::default();
            tracing::info!(sweep = %name, values = values.len(), "Sweep started");
        } else {
            tracing::info!(sweep = %name, index = start_index, "Sweep resumed");
        }

        let mut failed = false;
        for (index, value_actions) in generated.iter().enumerate().skip(start_index) {
            self.progress.lock().last_index = Some(index);
            if let Some(value) = values.get(index) {
                let label = self.format_value(value);
                tracing::info!(sweep = %name, value = %label, index, "Sweep value");
                action.set_status_message(format!(
                    "{name} = {label} ({}/{})",
                    index + 1,
                    values.len()
                ));
            }

            let mut actions: &[Action] = value_actions;
            let mut resume_child = None;
            if let Some(last) = resume_from.take() {
                if let Some(position) = actions.iter().position(|a| a.same_as(&last)) {
                    actions = &actions[position..];
                    resume_child = Some(last);
                }
            }

            for child in actions {
                self.progress.lock().last_action = Some(child.clone());
                action.set_critical(child.is_critical());

                if self.core.stop.is_triggered() {
                    child.force_status(Status::Interrupted);
                    self.finish(action, Status::Interrupted);
                    return Ok(());
                }

                let started = match resume_child.take() {
                    Some(last) if last.same_as(child) => child.resume(),
                    _ => child.start(),
                };

                let status = match started {
                    Ok(status) => status,
                    Err(e) => {
                        action.record_failure(anyhow::anyhow!("{e}"));
                        self.finish(action, Status::Error);
                        return Err(e);
                    }
                };

                match status {
                    Status::Interrupted => {
                        self.finish(action, Status::Interrupted);
                        return Ok(());
                    }
                    Status::Error => {
                        failed = true;
                        let reason = child
                            .error()
                            .map_or_else(|| "failed".to_string(), |f| f.message());
                        action.record_failure(anyhow::anyhow!("{}: {reason}", child.name()));
                        if child.is_critical() {
                            self.finish(action, Status::Error);
                            return Ok(());
                        }
                    }
                    _ => {}
                }
            }
        }

        self.finish(action, if failed { Status::Error } else { Status::Completed });
        Ok(())
    }
}

impl Drop for SweepAction {
    fn drop(&mut self) {
        for link in self.plan.get_mut().links.drain(..) {
            link.template.remove_listener(link.listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayloadError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop(name: &str) -> Action {
        Action::simple(name, |_| Ok(()))
    }

    fn sweep_of(values: &[i32], templates: Vec<Action>) -> Action {
        let action = Action::sweep("Field");
        let sweep = action.as_sweep().unwrap();
        sweep.set_values(values.iter().copied()).unwrap();
        for template in templates {
            sweep.add_template(template).unwrap();
        }
        action
    }

    #[test]
    fn test_linear_values() {
        let values = SweepValue::linear(0.0, 1.0, 5);
        assert_eq!(values.len(), 5);
        assert_eq!(values[2], SweepValue::Float(0.5));
        assert_eq!(values[4], SweepValue::Float(1.0));
        assert_eq!(SweepValue::linear(3.0, 4.0, 1), vec![SweepValue::Float(3.0)]);
        assert!(SweepValue::linear(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_value_display_and_order() {
        assert_eq!(SweepValue::from(2.5).to_string(), "2.5");
        assert_eq!(SweepValue::from("up").to_string(), "up");
        assert!(SweepValue::from(1) < SweepValue::from(2));
        assert_eq!(SweepValue::from(3).as_f64(), Some(3.0));

        let json: SweepValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(json, SweepValue::Float(1.5));
    }

    #[test]
    fn test_regeneration_follows_values_and_templates() {
        let action = sweep_of(&[1, 2, 3], vec![noop("Measure")]);
        let sweep = action.as_sweep().unwrap();
        assert_eq!(action.children().len(), 3);

        sweep.add_template(noop("Wait")).unwrap();
        assert_eq!(action.children().len(), 6);

        sweep.set_values([10, 20]).unwrap();
        let children = action.children();
        assert_eq!(children.len(), 4);
        assert_eq!(children[2].attribute("Field").as_deref(), Some("20"));
        assert_eq!(children[3].name(), "Wait");
    }

    #[test]
    fn test_children_listener_fires_on_regeneration() {
        let action = sweep_of(&[1], vec![]);
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        action.add_children_listener(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });

        action.as_sweep().unwrap().add_template(noop("A")).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_generated_actions_are_copies_tracking_template_name() {
        let template = noop("Measure");
        let action = sweep_of(&[1, 2], vec![template.clone()]);

        let children = action.children();
        assert!(children.iter().all(|c| !c.same_as(&template)));
        assert!(!children[0].same_as(&children[1]));

        template.set_name("Measure IV");
        assert!(action.children().iter().all(|c| c.name() == "Measure IV"));
    }

    #[test]
    fn test_generator_and_formatter() {
        let action = sweep_of(&[1, 2], vec![noop("Measure")]);
        let sweep = action.as_sweep().unwrap();
        sweep
            .set_generator(|value, mut copies| {
                copies.insert(0, Action::simple(format!("Set field to {value}"), |_| Ok(())));
                copies
            })
            .unwrap();
        sweep.set_formatter(|value| format!("{value} T")).unwrap();

        let children = action.children();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0].name(), "Set field to 1");
        assert_eq!(children[3].attribute("Field").as_deref(), Some("2 T"));
        assert_eq!(sweep.format_value(&SweepValue::from(7)), "7 T");
    }

    #[test]
    fn test_sweep_attributes_propagate() {
        let action = sweep_of(&[1, 2], vec![noop("Measure")]);
        action.set_attribute("Sample", "S7");
        assert!(action
            .children()
            .iter()
            .all(|c| c.attribute("Sample").as_deref() == Some("S7")));

        // New children inherit it too.
        action.as_sweep().unwrap().set_values([1, 2, 3]).unwrap();
        assert_eq!(action.children()[2].attribute("Sample").as_deref(), Some("S7"));
    }

    #[test]
    fn test_runs_every_child_in_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        let template = Action::simple("Record", move |ctx| {
            sink.lock().push(ctx.action().attribute("Field").unwrap_or_default());
            Ok(())
        });
        let action = sweep_of(&[1, 2, 3], vec![template]);

        assert_eq!(action.start().unwrap(), Status::Completed);
        assert_eq!(*order.lock(), vec!["1", "2", "3"]);
        assert_eq!(action.as_sweep().unwrap().last_index(), Some(2));
        assert_eq!(
            action.as_sweep().unwrap().last_value(),
            Some(SweepValue::Integer(3))
        );
    }

    #[test]
    fn test_empty_sweep_completes_and_runs_final_actions() {
        let finals = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&finals);
        let action = sweep_of(&[], vec![noop("Measure")]);
        action
            .as_sweep()
            .unwrap()
            .add_final_action(Action::simple("Park", move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        assert_eq!(action.start().unwrap(), Status::Completed);
        assert!(action.children().is_empty());
        assert_eq!(finals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_critical_failure_continues_then_errors() {
        let runs = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&runs);
        let template = Action::simple("Measure", move |ctx| {
            inner.fetch_add(1, Ordering::SeqCst);
            if ctx.action().attribute("Field").as_deref() == Some("2") {
                return Err(PayloadError::failed("overload"));
            }
            Ok(())
        });
        let action = sweep_of(&[1, 2, 3], vec![template]);

        assert_eq!(action.start().unwrap(), Status::Error);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(action.error().unwrap().message(), "Measure: overload");
    }

    #[test]
    fn test_running_sweep_rejects_mutation() {
        let slot: Arc<parking_lot::Mutex<Option<Action>>> = Arc::default();
        let rejected = Arc::new(AtomicUsize::new(0));

        let sweep_slot = Arc::clone(&slot);
        let counter = Arc::clone(&rejected);
        let template = Action::simple("Mutate", move |_| {
            if let Some(sweep) = sweep_slot.lock().clone() {
                let sweep = sweep.as_sweep().unwrap().clone();
                if let Err(SequencerError::SweepRunning { .. }) = sweep.set_values([5]) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                if sweep.add_template(Action::wait(std::time::Duration::ZERO)).is_err() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }
            Ok(())
        });
        let action = sweep_of(&[1], vec![template]);
        *slot.lock() = Some(action.clone());

        assert_eq!(action.start().unwrap(), Status::Completed);
        assert_eq!(rejected.load(Ordering::SeqCst), 2);
        assert_eq!(action.as_sweep().unwrap().values(), vec![SweepValue::Integer(1)]);
    }

    #[test]
    fn test_copy_is_deep() {
        let action = sweep_of(&[1, 2], vec![noop("Measure")]);
        let copy = action.copy();

        assert_eq!(copy.children().len(), 2);
        let original = action.as_sweep().unwrap().templates();
        let copied = copy.as_sweep().unwrap().templates();
        assert!(!original[0].same_as(&copied[0]));

        copy.as_sweep().unwrap().set_values([1]).unwrap();
        assert_eq!(action.children().len(), 2);
    }

    #[test]
    fn test_sweep_is_locked_until_final_actions_return() {
        let action = sweep_of(&[1, 2], vec![noop("Measure")]);
        let sweep = action.as_sweep().unwrap();

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let weak = action.downgrade();
        let sink = Arc::clone(&outcomes);
        sweep
            .add_final_action(Action::simple("Park", move |_| {
                if let Some(action) = weak.upgrade() {
                    let handle = action.as_sweep().unwrap();
                    sink.lock().push(matches!(
                        handle.set_values([7, 8, 9]),
                        Err(SequencerError::SweepRunning { .. })
                    ));
                    sink.lock().push(matches!(
                        action.start(),
                        Err(SequencerError::AlreadyRunning { .. })
                    ));
                    sink.lock().push(action.reset().is_err());
                }
                Ok(())
            }))
            .unwrap();

        assert_eq!(action.start().unwrap(), Status::Completed);
        assert_eq!(*outcomes.lock(), vec![true, true, true]);
        assert_eq!(sweep.values(), vec![SweepValue::Integer(1), SweepValue::Integer(2)]);

        sweep.set_values([3]).unwrap();
        assert_eq!(action.children().len(), 1);
    }
}
