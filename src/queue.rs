//! Action queue orchestration.
//!
//! An [`ActionQueue`] runs a flat list of top-level actions in order on the calling
//! thread, wrapped by two optional hook queues:
//!
//! ```text
//! reset working list ─> pre-hooks ─> action 1 ─> action 2 ─> … ─> post-hooks
//!                                        │            │
//!                                        └─ Interrupted / critical Error ─> post-hooks
//! ```
//!
//! A stop noticed *between* actions returns `Interrupted` immediately, without the
//! post-hooks. Every outcome and failure is also recorded in the queue's message log.
//!
//! # Example
//!
//! ```rust,ignore
//! let queue = Arc::new(ActionQueue::new());
//! queue.add_action(Action::wait(Duration::from_secs(1)))?;
//!
//! let runner = Arc::clone(&queue);
//! let handle = std::thread::spawn(move || runner.start());
//! queue.stop();
//! assert_eq!(handle.join().unwrap()?, QueueOutcome::Interrupted);
//! ```

use crate::action::listener::{Callback, Listeners};
use crate::action::{Action, ListenerId, Status, StopSignal};
use crate::error::{SequencerError, SequencerResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// Outcomes and Messages
// =============================================================================

/// Result of one queue run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueOutcome {
    /// Every action ran and none ended in error
    Success,
    /// Stopped by request
    Interrupted,
    /// At least one action ended in error
    Error,
}

impl std::fmt::Display for QueueOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            QueueOutcome::Success => "Success",
            QueueOutcome::Interrupted => "Interrupted",
            QueueOutcome::Error => "Error",
        };
        f.write_str(label)
    }
}

/// Severity of a queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageLevel {
    /// Progress information
    Info,
    /// Recoverable problem
    Warning,
    /// Failure
    Error,
}

/// Entry of the queue's message log.
#[derive(Debug, Clone, Serialize)]
pub struct QueueMessage {
    /// When the message was recorded
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: MessageLevel,
    /// Message text
    pub text: String,
    /// Name of the action the message concerns
    pub action: Option<String>,
}

// =============================================================================
// Action Queue
// =============================================================================

/// Resets the running flag and the stop request when a run ends, including by
/// unwinding. A stop that arrives before the run loop is reached stays pending.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    stop: &'a StopSignal,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.stop.reset();
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Ordered list of top-level actions with pre/post hook queues.
#[derive(Default)]
pub struct ActionQueue {
    actions: Mutex<Vec<Action>>,
    running: AtomicBool,
    stop: StopSignal,
    current: Mutex<Option<Action>>,
    last: Mutex<Option<Action>>,
    pre_hooks: Mutex<Option<Arc<ActionQueue>>>,
    post_hooks: Mutex<Option<Arc<ActionQueue>>>,
    messages: Mutex<Vec<QueueMessage>>,
    queue_listeners: Listeners<[Action]>,
    current_listeners: Listeners<Option<Action>>,
    message_listeners: Listeners<QueueMessage>,
}

impl ActionQueue {
    /// Empty queue without hooks.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Contents
    // -------------------------------------------------------------------------

    /// Snapshot of the top-level actions.
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    /// Action at `index`.
    pub fn get(&self, index: usize) -> Option<Action> {
        self.actions.lock().get(index).cloned()
    }

    /// Position of `action` in the queue.
    pub fn index_of(&self, action: &Action) -> Option<usize> {
        self.actions.lock().iter().position(|a| a.same_as(action))
    }

    /// Number of top-level actions.
    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    /// Whether the queue has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }

    fn edit<T>(
        &self,
        change: impl FnOnce(&mut Vec<Action>) -> SequencerResult<T>,
    ) -> SequencerResult<T> {
        let result = {
            let mut actions = self.actions.lock();
            if self.is_running() {
                return Err(SequencerError::QueueRunning);
            }
            change(&mut actions)?
        };

        let snapshot = self.actions();
        self.queue_listeners.notify("queue", &snapshot[..]);
        Ok(result)
    }

    fn check_index(index: usize, len: usize) -> SequencerResult<()> {
        if index >= len {
            return Err(SequencerError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    fn check_unique(actions: &[Action], action: &Action) -> SequencerResult<()> {
        if actions.iter().any(|a| a.same_as(action)) {
            return Err(SequencerError::DuplicateAction {
                name: action.name(),
            });
        }
        Ok(())
    }

    /// Append an action.
    pub fn add_action(&self, action: impl Into<Action>) -> SequencerResult<()> {
        let action = action.into();
        self.edit(|actions| {
            Self::check_unique(actions, &action)?;
            actions.push(action);
            Ok(())
        })
    }

    /// Insert an action at `index` (may equal the length).
    pub fn insert_action(&self, index: usize, action: impl Into<Action>) -> SequencerResult<()> {
        let action = action.into();
        self.edit(|actions| {
            if index > actions.len() {
                return Err(SequencerError::IndexOutOfRange {
                    index,
                    len: actions.len(),
                });
            }
            Self::check_unique(actions, &action)?;
            actions.insert(index, action);
            Ok(())
        })
    }

    /// Remove `action`.
    pub fn remove_action(&self, action: &Action) -> SequencerResult<()> {
        self.edit(|actions| {
            let index = actions
                .iter()
                .position(|a| a.same_as(action))
                .ok_or_else(|| SequencerError::ActionNotInQueue {
                    name: action.name(),
                })?;
            actions.remove(index);
            Ok(())
        })
    }

    /// Remove and return the action at `index`.
    pub fn remove_at(&self, index: usize) -> SequencerResult<Action> {
        self.edit(|actions| {
            Self::check_index(index, actions.len())?;
            Ok(actions.remove(index))
        })
    }

    /// Remove every action.
    pub fn clear_actions(&self) -> SequencerResult<()> {
        self.edit(|actions| {
            actions.clear();
            Ok(())
        })
    }

    /// Swap the actions at `a` and `b`.
    pub fn swap_actions(&self, a: usize, b: usize) -> SequencerResult<()> {
        self.edit(|actions| {
            Self::check_index(a, actions.len())?;
            Self::check_index(b, actions.len())?;
            actions.swap(a, b);
            Ok(())
        })
    }

    /// Move the action at `from` so that it ends up at `to`.
    pub fn move_action(&self, from: usize, to: usize) -> SequencerResult<()> {
        self.edit(|actions| {
            Self::check_index(from, actions.len())?;
            Self::check_index(to, actions.len())?;
            let action = actions.remove(from);
            actions.insert(to, action);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Hooks
    // -------------------------------------------------------------------------

    /// Queue run before the main list.
    pub fn pre_hooks(&self) -> Option<Arc<ActionQueue>> {
        self.pre_hooks.lock().clone()
    }

    /// Set or clear the queue run before the main list.
    pub fn set_pre_hooks(&self, hooks: Option<Arc<ActionQueue>>) -> SequencerResult<()> {
        if self.is_running() {
            return Err(SequencerError::QueueRunning);
        }
        *self.pre_hooks.lock() = hooks;
        Ok(())
    }

    /// Queue run after the main list.
    pub fn post_hooks(&self) -> Option<Arc<ActionQueue>> {
        self.post_hooks.lock().clone()
    }

    /// Set or clear the queue run after the main list.
    pub fn set_post_hooks(&self, hooks: Option<Arc<ActionQueue>>) -> SequencerResult<()> {
        if self.is_running() {
            return Err(SequencerError::QueueRunning);
        }
        *self.post_hooks.lock() = hooks;
        Ok(())
    }

    fn run_hooks(&self, hooks: Option<Arc<ActionQueue>>, label: &str) -> SequencerResult<()> {
        let Some(hooks) = hooks else {
            return Ok(());
        };
        if hooks.is_empty() {
            return Ok(());
        }

        let outcome = hooks.start()?;
        if outcome != QueueOutcome::Success {
            self.message(
                MessageLevel::Warning,
                format!("{label} finished with outcome {outcome}"),
                None,
            );
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Action currently running.
    pub fn current_action(&self) -> Option<Action> {
        self.current.lock().clone()
    }

    /// Action most recently started.
    pub fn last_action(&self) -> Option<Action> {
        self.last.lock().clone()
    }

    /// Run the whole list from the beginning.
    pub fn start(&self) -> SequencerResult<QueueOutcome> {
        self.run(false)
    }

    /// Continue from the first interrupted action, or run the whole list if none is.
    pub fn resume(&self) -> SequencerResult<QueueOutcome> {
        self.run(true)
    }

    /// Request a stop. Returns immediately; the running thread notices the request
    /// and returns `Interrupted`. Hook queues are not stopped. A request made while
    /// idle is held and interrupts the next run.
    pub fn stop(&self) {
        self.stop.trigger("queue stop requested");
        tracing::info!("Queue stop requested");
        for action in self.actions() {
            action.request_stop();
        }
    }

    fn enter(&self) -> SequencerResult<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SequencerError::QueueRunning)?;
        Ok(RunGuard {
            running: &self.running,
            stop: &self.stop,
        })
    }

    fn set_current(&self, action: Option<Action>) {
        if let Some(action) = &action {
            *self.last.lock() = Some(action.clone());
        }
        *self.current.lock() = action.clone();
        self.current_listeners.notify("queue", &action);
    }

    fn run(&self, resume: bool) -> SequencerResult<QueueOutcome> {
        let _guard = self.enter()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("queue_run", %run_id);
        let _entered = span.enter();

        let actions = self.actions();
        let resume_index = if resume {
            actions.iter().position(|a| a.status() == Status::Interrupted)
        } else {
            None
        };
        let resume = resume_index.is_some();
        let working = &actions[resume_index.unwrap_or(0)..];

        tracing::info!(actions = working.len(), resume, "Queue run started");
        self.message(
            MessageLevel::Info,
            if resume { "Queue resumed" } else { "Queue started" },
            None,
        );

        for action in working {
            action.reset()?;
        }

        self.run_hooks(self.pre_hooks(), "Pre-hooks")?;

        let mut failed = false;
        for (position, action) in working.iter().enumerate() {
            if self.stop.is_triggered() {
                action.force_status(Status::Interrupted);
                self.message(
                    MessageLevel::Warning,
                    "Queue stopped before action started",
                    Some(action),
                );
                tracing::info!(%run_id, "Queue run interrupted");
                return Ok(QueueOutcome::Interrupted);
            }

            self.set_current(Some(action.clone()));
            let started = if resume && position == 0 {
                action.resume()
            } else {
                action.start()
            };
            self.set_current(None);

            match started? {
                Status::Interrupted => {
                    self.message(MessageLevel::Warning, "Action interrupted", Some(action));
                    self.run_hooks(self.post_hooks(), "Post-hooks")?;
                    tracing::info!(%run_id, "Queue run interrupted");
                    return Ok(QueueOutcome::Interrupted);
                }
                Status::Error => {
                    failed = true;
                    let reason = action
                        .error()
                        .map_or_else(|| "unknown failure".to_string(), |f| f.message());
                    self.message(
                        MessageLevel::Error,
                        format!("Action failed: {reason}"),
                        Some(action),
                    );

                    if action.is_critical() {
                        self.message(
                            MessageLevel::Error,
                            "Critical action failed; aborting queue",
                            Some(action),
                        );
                        self.run_hooks(self.post_hooks(), "Post-hooks")?;
                        tracing::error!(%run_id, action = %action.name(), "Queue run aborted");
                        return Ok(QueueOutcome::Error);
                    }
                }
                status => {
                    self.message(
                        MessageLevel::Info,
                        format!("Action finished: {status}"),
                        Some(action),
                    );
                }
            }
        }

        self.run_hooks(self.post_hooks(), "Post-hooks")?;

        let outcome = if failed {
            QueueOutcome::Error
        } else {
            QueueOutcome::Success
        };
        tracing::info!(%run_id, %outcome, "Queue run finished");
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Messages and listeners
    // -------------------------------------------------------------------------

    fn message(&self, level: MessageLevel, text: impl Into<String>, action: Option<&Action>) {
        let message = QueueMessage {
            timestamp: Utc::now(),
            level,
            text: text.into(),
            action: action.map(Action::name),
        };

        let subject = message.action.as_deref().unwrap_or("-");
        match level {
            MessageLevel::Info => tracing::info!(action = subject, "{}", message.text),
            MessageLevel::Warning => tracing::warn!(action = subject, "{}", message.text),
            MessageLevel::Error => tracing::error!(action = subject, "{}", message.text),
        }

        self.messages.lock().push(message.clone());
        self.message_listeners.notify("queue", &message);
    }

    /// Message log, oldest first.
    pub fn messages(&self) -> Vec<QueueMessage> {
        self.messages.lock().clone()
    }

    /// Empty the message log.
    pub fn clear_messages(&self) {
        self.messages.lock().clear();
    }

    /// Called with the new list whenever actions are added, removed or reordered.
    pub fn add_queue_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[Action]) + Send + Sync + 'static,
    {
        let callback: Callback<[Action]> = Arc::new(listener);
        self.queue_listeners.add(callback)
    }

    /// Called whenever the running action changes (`None` between actions).
    pub fn add_current_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Option<Action>) + Send + Sync + 'static,
    {
        self.current_listeners.add(Arc::new(listener))
    }

    /// Called for every new message.
    pub fn add_message_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QueueMessage) + Send + Sync + 'static,
    {
        self.message_listeners.add(Arc::new(listener))
    }

    /// Remove a queue, current-action or message listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let queue = self.queue_listeners.remove(id);
        let current = self.current_listeners.remove(id);
        let message = self.message_listeners.remove(id);
        queue || current || message
    }
}
