//! Simple variant: runs a closure once.

use super::{run_guarded, Action, ActionCore, RunContext};
use crate::error::PayloadError;
use std::sync::Arc;

/// Closure run by a [`SimpleAction`].
pub type Payload = Arc<dyn Fn(&RunContext) -> Result<(), PayloadError> + Send + Sync>;

/// Action that runs a payload closure once.
///
/// `Ok` completes the action even if a stop arrived while it ran; `Cancelled`
/// interrupts it; any other failure ends it in `Error` with the cause stored.
pub struct SimpleAction {
    pub(crate) core: ActionCore,
    payload: Payload,
}

impl SimpleAction {
    /// Create a simple action named `name`.
    pub fn new<F>(name: impl Into<String>, payload: F) -> Self
    where
        F: Fn(&RunContext) -> Result<(), PayloadError> + Send + Sync + 'static,
    {
        Self {
            core: ActionCore::new(name),
            payload: Arc::new(payload),
        }
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self {
            core: self.core.duplicate(),
            payload: Arc::clone(&self.payload),
        }
    }

    pub(crate) fn execute(&self, action: &Action) {
        let ctx = RunContext::new(action.clone(), self.core.stop.clone());
        let outcome = run_guarded(|| (self.payload)(&ctx));
        action.settle(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Status;
    use std::time::Duration;

    #[test]
    fn test_cancelled_payload_is_interrupted() {
        let action = Action::simple("Cool down", |ctx| {
            loop {
                ctx.sleep(Duration::from_millis(5))?;
            }
        });

        let stopper = action.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            stopper.stop()
        });

        assert_eq!(action.start().unwrap(), Status::Interrupted);
        assert!(handle.join().unwrap());
        assert!(action.error().is_none());
    }

    #[test]
    fn test_finished_payload_completes_despite_stop() {
        let action = Action::simple("Ignore stop", |ctx| {
            while !ctx.is_stopped() {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        });

        let stopper = action.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            stopper.stop()
        });

        assert_eq!(action.start().unwrap(), Status::Completed);
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_context_exposes_running_action() {
        let action = Action::simple("Ramp", |ctx| {
            ctx.set_status_message("ramping to 10 V");
            ctx.action().set_attribute("Target", "10 V");
            Ok(())
        });

        action.start().unwrap();
        assert_eq!(action.status_message().as_deref(), Some("ramping to 10 V"));
        assert_eq!(action.attribute("Target").as_deref(), Some("10 V"));
    }
}
