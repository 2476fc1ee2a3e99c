//! Listener registries.
//!
//! Callbacks are stored behind a `parking_lot::Mutex` and delivered synchronously on
//! the thread that caused the change. Delivery works on a snapshot of the registry, so
//! a callback may add or remove listeners (or mutate the object it observes) without
//! deadlocking. A panicking callback is logged and skipped; it never unwinds into the
//! action or queue that fired it.

use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared callback invoked with the changed object.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle identifying a registered listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Registry of callbacks for one kind of event.
pub(crate) struct Listeners<E: ?Sized> {
    entries: Mutex<Vec<(ListenerId, Callback<E>)>>,
}

impl<E: ?Sized> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<E: ?Sized> Listeners<E> {
    /// Register `callback` under a fresh id.
    pub fn add(&self, callback: Callback<E>) -> ListenerId {
        let id = ListenerId::next();
        self.add_with_id(id, callback);
        id
    }

    /// Register `callback` under an existing id (composite registrations).
    pub fn add_with_id(&self, id: ListenerId, callback: Callback<E>) {
        self.entries.lock().push((id, callback));
    }

    /// Remove the listener registered as `id`. Returns whether one was found.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Invoke every listener with `event`, swallowing panics.
    pub fn notify(&self, source: &str, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in &snapshot {
            deliver(source, callback, event);
        }
    }
}

/// Invoke a single callback, logging and swallowing a panic.
pub(crate) fn deliver<E: ?Sized>(source: &str, callback: &Callback<E>, event: &E) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
        tracing::warn!(
            source,
            reason = %panic_message(panic.as_ref()),
            "Listener panicked; ignoring"
        );
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
