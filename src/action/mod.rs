//! Actions: named, stateful, observable units of work.
//!
//! An [`Action`] is a cheap, cloneable handle over one of three variants:
//!
//! - [`SimpleAction`]: runs a closure once.
//! - [`MeasurementAction`]: runs an external [`Measurement`] with bounded retry and
//!   collects its output into a [`ResultTable`].
//! - [`SweepAction`]: iterates a list of [`SweepValue`]s and runs a freshly generated
//!   sub-action list per value.
//!
//! Every variant embeds an `ActionCore` holding the common state (name, status,
//! attributes, tags, critical flag, stored failure) and the listener registries.
//!
//! # Threading
//!
//! `start()` / `resume()` run the payload synchronously on the calling thread.
//! `request_stop()` and `stop()` may be called from any other thread; cancellation is
//! cooperative through the [`RunContext`] handed to the payload.
//!
//! # Example
//!
//! ```rust,ignore
//! use daq_sequencer::action::{Action, Status};
//!
//! let action = Action::simple("Open shutter", |_ctx| Ok(()));
//! action.set_attribute("Laser", "532 nm");
//! assert_eq!(action.start()?, Status::Completed);
//! ```

pub mod attributes;
pub mod listener;
pub mod measurement;
pub mod results;
pub mod simple;
pub mod status;
pub mod stop;
pub mod sweep;

pub use attributes::Attributes;
pub use listener::ListenerId;
pub use measurement::{Measurement, MeasurementAction};
pub use results::{pattern_namer, ResultNamer, ResultTable};
pub use simple::SimpleAction;
pub use status::Status;
pub use stop::{RunContext, StopPolicy, StopSignal};
pub use sweep::{SweepAction, SweepGenerator, SweepValue, ValueFormatter};

use crate::error::{ActionFailure, PayloadError, SequencerError, SequencerResult};
use listener::{deliver, panic_message, Callback, Listeners};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

// =============================================================================
// Common State
// =============================================================================

struct CoreState {
    name: String,
    status: Status,
    status_message: Option<String>,
    attributes: Attributes,
    tags: Vec<String>,
    critical: bool,
    error: Option<ActionFailure>,
}

/// State and listener registries shared by every action variant.
pub(crate) struct ActionCore {
    state: Mutex<CoreState>,
    name_listeners: Listeners<Action>,
    attribute_listeners: Listeners<Action>,
    status_listeners: Listeners<Action>,
    children_listeners: Listeners<Action>,
    on_start: Mutex<Option<Callback<Action>>>,
    on_finish: Mutex<Option<Callback<Action>>>,
    // Serialises delivery per action; re-entrant so a listener may mutate the action.
    delivery: ReentrantMutex<()>,
    pub(crate) stop: StopSignal,
    stop_policy: Mutex<StopPolicy>,
    // Set from `begin` until `run` returns, final actions and hooks included.
    executing: AtomicBool,
}

/// Clears the executing flag when a run returns, including by unwinding.
struct ExecutingGuard<'a>(&'a AtomicBool);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ActionCore {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(CoreState {
                name: name.into(),
                status: Status::NotStarted,
                status_message: None,
                attributes: Attributes::new(),
                tags: Vec::new(),
                critical: false,
                error: None,
            }),
            name_listeners: Listeners::default(),
            attribute_listeners: Listeners::default(),
            status_listeners: Listeners::default(),
            children_listeners: Listeners::default(),
            on_start: Mutex::new(None),
            on_finish: Mutex::new(None),
            delivery: ReentrantMutex::new(()),
            stop: StopSignal::new(),
            stop_policy: Mutex::new(StopPolicy::default()),
            executing: AtomicBool::new(false),
        }
    }

    /// Fresh core carrying over name, attributes, tags, critical flag and stop policy.
    /// Status, stored failure and listeners are not copied.
    pub(crate) fn duplicate(&self) -> Self {
        let mut copy = {
            let state = self.state.lock();
            let mut copy = ActionCore::new(state.name.clone());
            let target = copy.state.get_mut();
            target.attributes = state.attributes.clone();
            target.tags = state.tags.clone();
            target.critical = state.critical;
            copy
        };
        *copy.stop_policy.get_mut() = *self.stop_policy.lock();
        copy
    }

    pub(crate) fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    pub(crate) fn status(&self) -> Status {
        self.state.lock().status
    }

    /// Whether a `start`/`resume` call is still in progress, even after the
    /// terminal status has been set.
    pub(crate) fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    pub(crate) fn attributes(&self) -> Attributes {
        self.state.lock().attributes.clone()
    }

    pub(crate) fn is_critical(&self) -> bool {
        self.state.lock().critical
    }
}

// =============================================================================
// Action Handle
// =============================================================================

/// Variant tag of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    /// Runs a closure once
    Simple,
    /// Runs a measurement with bounded retry
    Measurement,
    /// Iterates sweep values over generated sub-actions
    Sweep,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ActionKind::Simple => "simple",
            ActionKind::Measurement => "measurement",
            ActionKind::Sweep => "sweep",
        };
        f.write_str(label)
    }
}

/// Shared handle to an action. Cloning yields another handle to the same action;
/// equality is identity.
#[derive(Clone)]
pub enum Action {
    /// Closure-backed action
    Simple(Arc<SimpleAction>),
    /// Measurement with bounded retry
    Measurement(Arc<MeasurementAction>),
    /// Parameter sweep
    Sweep(Arc<SweepAction>),
}

/// Non-owning handle to an action.
#[derive(Clone)]
pub enum WeakAction {
    /// Closure-backed action
    Simple(Weak<SimpleAction>),
    /// Measurement with bounded retry
    Measurement(Weak<MeasurementAction>),
    /// Parameter sweep
    Sweep(Weak<SweepAction>),
}

impl WeakAction {
    /// Upgrade to a strong handle if the action is still alive.
    pub fn upgrade(&self) -> Option<Action> {
        match self {
            WeakAction::Simple(weak) => weak.upgrade().map(Action::Simple),
            WeakAction::Measurement(weak) => weak.upgrade().map(Action::Measurement),
            WeakAction::Sweep(weak) => weak.upgrade().map(Action::Sweep),
        }
    }
}

impl From<Arc<SimpleAction>> for Action {
    fn from(value: Arc<SimpleAction>) -> Self {
        Action::Simple(value)
    }
}

impl From<Arc<MeasurementAction>> for Action {
    fn from(value: Arc<MeasurementAction>) -> Self {
        Action::Measurement(value)
    }
}

impl From<Arc<SweepAction>> for Action {
    fn from(value: Arc<SweepAction>) -> Self {
        Action::Sweep(value)
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Action {}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

impl Action {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Action that runs `payload` once.
    pub fn simple<F>(name: impl Into<String>, payload: F) -> Action
    where
        F: Fn(&RunContext) -> Result<(), PayloadError> + Send + Sync + 'static,
    {
        Action::Simple(Arc::new(SimpleAction::new(name, payload)))
    }

    /// Action that runs `measurement` with bounded retry.
    pub fn measurement<M: Measurement + 'static>(measurement: M) -> Action {
        Action::Measurement(Arc::new(MeasurementAction::new(Arc::new(measurement))))
    }

    /// Empty sweep named `name`. Configure it through [`Action::as_sweep`].
    pub fn sweep(name: impl Into<String>) -> Action {
        Action::Sweep(SweepAction::new(name))
    }

    /// Interruptible wait of `duration`.
    pub fn wait(duration: Duration) -> Action {
        Action::simple(format!("Wait {}", format_duration(duration)), move |ctx| {
            ctx.sleep(duration)
        })
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    pub(crate) fn core(&self) -> &ActionCore {
        match self {
            Action::Simple(simple) => &simple.core,
            Action::Measurement(measurement) => &measurement.core,
            Action::Sweep(sweep) => &sweep.core,
        }
    }

    /// Variant tag.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Simple(_) => ActionKind::Simple,
            Action::Measurement(_) => ActionKind::Measurement,
            Action::Sweep(_) => ActionKind::Sweep,
        }
    }

    /// Whether both handles refer to the same action.
    pub fn same_as(&self, other: &Action) -> bool {
        std::ptr::eq(self.core(), other.core())
    }

    /// Non-owning handle.
    pub fn downgrade(&self) -> WeakAction {
        match self {
            Action::Simple(simple) => WeakAction::Simple(Arc::downgrade(simple)),
            Action::Measurement(m) => WeakAction::Measurement(Arc::downgrade(m)),
            Action::Sweep(sweep) => WeakAction::Sweep(Arc::downgrade(sweep)),
        }
    }

    /// Simple variant, if this is one.
    pub fn as_simple(&self) -> Option<&Arc<SimpleAction>> {
        match self {
            Action::Simple(simple) => Some(simple),
            _ => None,
        }
    }

    /// Measurement variant, if this is one.
    pub fn as_measurement(&self) -> Option<&Arc<MeasurementAction>> {
        match self {
            Action::Measurement(measurement) => Some(measurement),
            _ => None,
        }
    }

    /// Sweep variant, if this is one.
    pub fn as_sweep(&self) -> Option<&Arc<SweepAction>> {
        match self {
            Action::Sweep(sweep) => Some(sweep),
            _ => None,
        }
    }

    /// Deep copy: same payload, copied metadata, status `NotStarted`, no listeners.
    /// Sweeps copy their templates and final actions and regenerate their children.
    pub fn copy(&self) -> Action {
        match self {
            Action::Simple(simple) => Action::Simple(Arc::new(simple.duplicate())),
            Action::Measurement(m) => Action::Measurement(Arc::new(m.duplicate())),
            Action::Sweep(sweep) => Action::Sweep(sweep.duplicate()),
        }
    }

    // -------------------------------------------------------------------------
    // Name, attributes and tags
    // -------------------------------------------------------------------------

    /// Current name.
    pub fn name(&self) -> String {
        self.core().name()
    }

    /// Rename the action and notify name listeners.
    pub fn set_name(&self, name: impl Into<String>) {
        self.core().state.lock().name = name.into();
        if let Action::Sweep(sweep) = self {
            // The sweep name keys the per-value attribute of generated children.
            if !self.is_running() {
                sweep.regenerate();
            }
        }
        self.fire(|core| &core.name_listeners);
    }

    /// Snapshot of all attributes, in insertion order.
    pub fn attributes(&self) -> Attributes {
        self.core().attributes()
    }

    /// Value of one attribute.
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.core().state.lock().attributes.get(key).map(str::to_string)
    }

    /// Whether the attribute is set.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.core().state.lock().attributes.contains(key)
    }

    /// Set an attribute. Measurements mirror it onto their current result table and
    /// sweeps propagate it to every generated child.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        self.core()
            .state
            .lock()
            .attributes
            .set(key.clone(), value.clone());

        match self {
            Action::Measurement(measurement) => measurement.mirror_attribute(&key, Some(&value)),
            Action::Sweep(sweep) => {
                for child in sweep.children() {
                    child.set_attribute(key.clone(), value.clone());
                }
            }
            Action::Simple(_) => {}
        }

        self.fire(|core| &core.attribute_listeners);
    }

    /// Remove an attribute (and its mirrored/propagated copies).
    pub fn remove_attribute(&self, key: &str) {
        let removed = self.core().state.lock().attributes.remove(key).is_some();
        if !removed {
            return;
        }

        match self {
            Action::Measurement(measurement) => measurement.mirror_attribute(key, None),
            Action::Sweep(sweep) => {
                for child in sweep.children() {
                    child.remove_attribute(key);
                }
            }
            Action::Simple(_) => {}
        }

        self.fire(|core| &core.attribute_listeners);
    }

    /// Attributes joined as `key{assignment}value` pairs separated by `delimiter`.
    pub fn attribute_string(&self, delimiter: &str, assignment: &str) -> String {
        self.attributes().join(delimiter, assignment)
    }

    /// Attributes in a form usable inside file names.
    pub fn attribute_path_string(&self) -> String {
        self.attributes().path_string()
    }

    /// Tags, in insertion order.
    pub fn tags(&self) -> Vec<String> {
        self.core().state.lock().tags.clone()
    }

    /// Add a tag. Attribute listeners are notified.
    pub fn add_tag(&self, tag: impl Into<String>) {
        self.core().state.lock().tags.push(tag.into());
        self.fire(|core| &core.attribute_listeners);
    }

    /// Remove the first occurrence of `tag`.
    pub fn remove_tag(&self, tag: &str) {
        {
            let mut state = self.core().state.lock();
            match state.tags.iter().position(|t| t == tag) {
                Some(index) => {
                    state.tags.remove(index);
                }
                None => return,
            }
        }
        self.fire(|core| &core.attribute_listeners);
    }

    /// Remove every tag.
    pub fn clear_tags(&self) {
        self.core().state.lock().tags.clear();
        self.fire(|core| &core.attribute_listeners);
    }

    /// Whether a failure of this action aborts its enclosing queue or sweep.
    pub fn is_critical(&self) -> bool {
        self.core().is_critical()
    }

    /// Mark the action as critical (or not).
    pub fn set_critical(&self, critical: bool) {
        self.core().state.lock().critical = critical;
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    /// Current status.
    pub fn status(&self) -> Status {
        self.core().status()
    }

    /// Whether the action is executing (running, retrying or stopping).
    pub fn is_running(&self) -> bool {
        self.status().is_active()
    }

    /// Move to `status`, enforcing the lifecycle transition table.
    pub fn set_status(&self, status: Status) -> SequencerResult<()> {
        {
            let mut state = self.core().state.lock();
            if !state.status.can_transition_to(status) {
                return Err(SequencerError::InvalidTransition {
                    name: state.name.clone(),
                    from: state.status,
                    to: status,
                });
            }
            state.status = status;
        }
        self.fire(|core| &core.status_listeners);
        Ok(())
    }

    /// Set the status from engine code, which only performs legal moves but may race a
    /// concurrent stop request.
    pub(crate) fn force_status(&self, status: Status) {
        self.core().state.lock().status = status;
        self.fire(|core| &core.status_listeners);
    }

    /// Free-text progress message.
    pub fn status_message(&self) -> Option<String> {
        self.core().state.lock().status_message.clone()
    }

    /// Publish a progress message; delivered through the status listeners.
    pub fn set_status_message(&self, message: impl Into<String>) {
        self.core().state.lock().status_message = Some(message.into());
        self.fire(|core| &core.status_listeners);
    }

    /// Failure cause of the last run, if it ended in error.
    pub fn error(&self) -> Option<ActionFailure> {
        self.core().state.lock().error.clone()
    }

    pub(crate) fn record_failure(&self, cause: anyhow::Error) {
        self.core().state.lock().error = Some(ActionFailure::new(cause));
    }

    /// Settle a payload outcome into a terminal status.
    pub(crate) fn settle(&self, outcome: Result<(), PayloadError>) {
        match outcome {
            Ok(()) => self.force_status(Status::Completed),
            Err(PayloadError::Cancelled) => self.force_status(Status::Interrupted),
            Err(PayloadError::Failed(cause)) => {
                self.record_failure(cause);
                self.force_status(Status::Error);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Children and results
    // -------------------------------------------------------------------------

    /// What this action contains: a sweep's generated actions, flattened. Empty for
    /// other variants.
    pub fn children(&self) -> Vec<Action> {
        match self {
            Action::Sweep(sweep) => sweep.children(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn notify_children(&self) {
        self.fire(|core| &core.children_listeners);
    }

    /// Every result table produced in this action's subtree.
    pub fn results(&self) -> Vec<Arc<ResultTable>> {
        match self {
            Action::Simple(_) => Vec::new(),
            Action::Measurement(measurement) => measurement.results().into_iter().collect(),
            Action::Sweep(sweep) => sweep
                .children()
                .iter()
                .chain(sweep.final_actions().iter())
                .flat_map(Action::results)
                .collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Run from the beginning on the calling thread and return the terminal status.
    ///
    /// Returns `Err` only for structural misuse (the action is already running);
    /// payload failures are reported through the returned status and [`Action::error`].
    pub fn start(&self) -> SequencerResult<Status> {
        self.run(false)
    }

    /// Continue after an interruption. Sweeps pick up at the value and action they
    /// were stopped in; other variants run from the beginning.
    pub fn resume(&self) -> SequencerResult<Status> {
        self.run(true)
    }

    fn begin(&self) -> SequencerResult<()> {
        {
            let mut state = self.core().state.lock();
            if state.status.is_active() || self.core().is_executing() {
                return Err(SequencerError::AlreadyRunning {
                    name: state.name.clone(),
                });
            }
            self.core().executing.store(true, Ordering::SeqCst);
            // A stop addressed to a finished run must not leak into the next one.
            if state.status.is_terminal() {
                self.core().stop.reset();
            }
            state.status = Status::Running;
            state.error = None;
        }
        self.fire(|core| &core.status_listeners);
        Ok(())
    }

    fn run(&self, resume: bool) -> SequencerResult<Status> {
        self.begin()?;
        let _executing = ExecutingGuard(&self.core().executing);

        let span = tracing::info_span!("action", name = %self.name(), kind = %self.kind());
        let _entered = span.enter();
        self.fire_hook(|core| &core.on_start);

        let outcome = if self.core().stop.is_triggered() {
            tracing::info!("Stop requested before the action began");
            self.force_status(Status::Interrupted);
            Ok(())
        } else {
            match self {
                Action::Simple(simple) => {
                    simple.execute(self);
                    Ok(())
                }
                Action::Measurement(measurement) => {
                    measurement.execute(self);
                    Ok(())
                }
                Action::Sweep(sweep) => sweep.execute(self, resume),
            }
        };

        let status = self.status();
        match (status, self.error()) {
            (Status::Error, Some(failure)) => {
                tracing::warn!(error = %failure, critical = self.is_critical(), "Action failed")
            }
            (Status::Interrupted, _) => tracing::info!("Action interrupted"),
            _ => tracing::debug!(%status, "Action finished"),
        }

        self.fire_hook(|core| &core.on_finish);
        outcome.map(|()| status)
    }

    /// Request cancellation without waiting. Safe from any thread.
    pub fn request_stop(&self) {
        let core = self.core();
        core.stop.trigger("stop requested");

        let stopping = {
            let mut state = core.state.lock();
            if state.status.is_active() && state.status != Status::Stopping {
                state.status = Status::Stopping;
                true
            } else {
                false
            }
        };
        if stopping {
            self.fire(|core| &core.status_listeners);
        }

        match self {
            Action::Measurement(measurement) => measurement.abort(),
            Action::Sweep(sweep) => {
                if let Some(child) = sweep.last_action() {
                    child.request_stop();
                }
            }
            Action::Simple(_) => {}
        }
    }

    /// Request cancellation and wait, within the [`StopPolicy`] bound, until the action
    /// has left its active states. Returns whether it did.
    pub fn stop(&self) -> bool {
        let policy = self.stop_policy();
        self.request_stop();
        for _ in 0..policy.max_polls {
            if !self.is_running() {
                return true;
            }
            std::thread::sleep(policy.poll_interval);
            // Reaches a sweep child started after the previous request.
            self.request_stop();
        }

        let stopped = !self.is_running();
        if !stopped {
            tracing::warn!(
                action = %self.name(),
                timeout_ms = policy.timeout().as_millis() as u64,
                "Action did not stop within the polling bound"
            );
        }
        stopped
    }

    /// Return to `NotStarted`, clearing the status message, stored failure and any
    /// pending stop request. Attributes, tags and results are kept.
    pub fn reset(&self) -> SequencerResult<()> {
        {
            let mut state = self.core().state.lock();
            if state.status.is_active() || self.core().is_executing() {
                return Err(SequencerError::AlreadyRunning {
                    name: state.name.clone(),
                });
            }
            state.status = Status::NotStarted;
            state.status_message = None;
            state.error = None;
        }
        self.core().stop.reset();
        self.fire(|core| &core.status_listeners);
        Ok(())
    }

    /// Bound used by [`Action::stop`].
    pub fn stop_policy(&self) -> StopPolicy {
        *self.core().stop_policy.lock()
    }

    /// Change the bound used by [`Action::stop`].
    pub fn set_stop_policy(&self, policy: StopPolicy) {
        *self.core().stop_policy.lock() = policy;
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    /// Called after every rename.
    pub fn add_name_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.core().name_listeners.add(Arc::new(listener))
    }

    /// Called after every attribute or tag change.
    pub fn add_attribute_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.core().attribute_listeners.add(Arc::new(listener))
    }

    /// Called after every status change and status message.
    pub fn add_status_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.core().status_listeners.add(Arc::new(listener))
    }

    /// Called whenever the children list is regenerated.
    pub fn add_children_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.core().children_listeners.add(Arc::new(listener))
    }

    /// Register one callback for name, attribute, status and children changes.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        let core = self.core();
        let callback: Callback<Action> = Arc::new(listener);
        let id = ListenerId::next();
        core.name_listeners.add_with_id(id, Arc::clone(&callback));
        core.attribute_listeners.add_with_id(id, Arc::clone(&callback));
        core.status_listeners.add_with_id(id, Arc::clone(&callback));
        core.children_listeners.add_with_id(id, callback);
        id
    }

    /// Remove a listener from whichever registries hold it.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let core = self.core();
        let name = core.name_listeners.remove(id);
        let attribute = core.attribute_listeners.remove(id);
        let status = core.status_listeners.remove(id);
        let children = core.children_listeners.remove(id);
        name || attribute || status || children
    }

    /// Hook called when a run begins.
    pub fn set_on_start<F>(&self, hook: F)
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        *self.core().on_start.lock() = Some(Arc::new(hook));
    }

    /// Hook called once a run has reached its terminal status.
    pub fn set_on_finish<F>(&self, hook: F)
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        *self.core().on_finish.lock() = Some(Arc::new(hook));
    }

    fn fire(&self, registry: impl Fn(&ActionCore) -> &Listeners<Action>) {
        let core = self.core();
        let _serial = core.delivery.lock();
        registry(core).notify("action", self);
    }

    fn fire_hook(&self, slot: impl Fn(&ActionCore) -> &Mutex<Option<Callback<Action>>>) {
        let hook = slot(self.core()).lock().clone();
        if let Some(hook) = hook {
            let _serial = self.core().delivery.lock();
            deliver("action hook", &hook, self);
        }
    }

    // -------------------------------------------------------------------------
    // Display
    // -------------------------------------------------------------------------

    /// Serialisable view of the action and its children, for displays and reports.
    pub fn snapshot(&self) -> ActionSnapshot {
        let state = {
            let state = self.core().state.lock();
            (
                state.name.clone(),
                state.status,
                state.critical,
                state.attributes.clone(),
                state.tags.clone(),
                state.status_message.clone(),
                state.error.as_ref().map(ActionFailure::message),
            )
        };
        let (name, status, critical, attributes, tags, status_message, error) = state;

        ActionSnapshot {
            name,
            kind: self.kind(),
            status,
            critical,
            attributes,
            tags,
            status_message,
            error,
            children: self.children().iter().map(Action::snapshot).collect(),
        }
    }
}

/// Serialisable view of an action tree.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSnapshot {
    /// Action name
    pub name: String,
    /// Variant
    pub kind: ActionKind,
    /// Status at the time of the snapshot
    pub status: Status,
    /// Critical flag
    pub critical: bool,
    /// Attributes
    pub attributes: Attributes,
    /// Tags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Progress message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Generated children
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ActionSnapshot>,
}

/// Run `payload`, converting a panic into a failure.
pub(crate) fn run_guarded<F>(payload: F) -> Result<(), PayloadError>
where
    F: FnOnce() -> Result<(), PayloadError>,
{
    match catch_unwind(AssertUnwindSafe(payload)) {
        Ok(outcome) => outcome,
        Err(panic) => Err(PayloadError::Failed(anyhow::anyhow!(
            "payload panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        return format!("{millis} ms");
    }

    let total_secs = duration.as_secs();
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60);
    if hours > 0 {
        format!("{hours} h {minutes} min {seconds} s")
    } else if minutes > 0 {
        format!("{minutes} min {seconds} s")
    } else {
        let secs = duration.as_secs_f64();
        if duration.subsec_millis() == 0 {
            format!("{secs:.0} s")
        } else {
            format!("{secs:.1} s")
        }
    }
}
