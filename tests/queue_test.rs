//! Queue ordering, critical-failure propagation, hooks and stop/resume.

use daq_sequencer::{
    Action, ActionQueue, PayloadError, QueueOutcome, SequencerError, Status,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Journal = Arc<Mutex<Vec<String>>>;

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Action that appends its name to `journal` and then succeeds.
fn recording(name: &str, journal: &Journal) -> Action {
    let journal = Arc::clone(journal);
    let label = name.to_string();
    Action::simple(name, move |_| {
        journal.lock().push(label.clone());
        Ok(())
    })
}

/// Action that appends its name to `journal` and then fails.
fn failing(name: &str, journal: &Journal, critical: bool) -> Action {
    let journal = Arc::clone(journal);
    let label = name.to_string();
    let action = Action::simple(name, move |_| {
        journal.lock().push(label.clone());
        Err(PayloadError::failed(format!("{label} failed")))
    });
    action.set_critical(critical);
    action
}

fn hooks(actions: Vec<Action>) -> Option<Arc<ActionQueue>> {
    let queue = ActionQueue::new();
    for action in actions {
        queue.add_action(action).unwrap();
    }
    Some(Arc::new(queue))
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_all_success_runs_in_order_once() {
    let log = journal();
    let queue = ActionQueue::new();
    for name in ["A", "B", "C"] {
        queue.add_action(recording(name, &log)).unwrap();
    }

    assert_eq!(queue.start().unwrap(), QueueOutcome::Success);
    assert_eq!(*log.lock(), vec!["A", "B", "C"]);
    assert!(queue
        .actions()
        .iter()
        .all(|a| a.status() == Status::Completed));
    assert!(!queue.is_running());
}

#[test]
fn test_non_critical_failures_continue_and_report_error() {
    let log = journal();
    let queue = ActionQueue::new();
    queue.add_action(failing("A", &log, false)).unwrap();
    queue.add_action(recording("B", &log)).unwrap();
    queue.add_action(failing("C", &log, false)).unwrap();

    assert_eq!(queue.start().unwrap(), QueueOutcome::Error);
    assert_eq!(*log.lock(), vec!["A", "B", "C"]);
    assert_eq!(queue.get(1).unwrap().status(), Status::Completed);
}

#[test]
fn test_critical_failure_aborts_queue_after_post_hooks() {
    let log = journal();
    let queue = ActionQueue::new();
    let a = failing("A", &log, false);
    let b = failing("B", &log, true);
    let c = recording("C", &log);
    queue.add_action(a.clone()).unwrap();
    queue.add_action(b.clone()).unwrap();
    queue.add_action(c.clone()).unwrap();
    queue.set_pre_hooks(hooks(vec![recording("pre", &log)])).unwrap();
    queue.set_post_hooks(hooks(vec![recording("post", &log)])).unwrap();

    assert_eq!(queue.start().unwrap(), QueueOutcome::Error);
    assert_eq!(*log.lock(), vec!["pre", "A", "B", "post"]);
    assert_eq!(a.status(), Status::Error);
    assert_eq!(b.status(), Status::Error);
    assert_eq!(c.status(), Status::NotStarted);
    assert_eq!(b.error().unwrap().message(), "B failed");
}

#[test]
fn test_failing_hooks_do_not_change_outcome() {
    let log = journal();
    let queue = ActionQueue::new();
    queue.add_action(recording("A", &log)).unwrap();
    queue
        .set_post_hooks(hooks(vec![failing("cleanup", &log, true)]))
        .unwrap();

    assert_eq!(queue.start().unwrap(), QueueOutcome::Success);
    assert!(queue
        .messages()
        .iter()
        .any(|m| m.text.contains("Post-hooks")));
}

#[test]
fn test_stop_before_action_skips_post_hooks() {
    let log = journal();
    let queue = Arc::new(ActionQueue::new());
    let a = recording("A", &log);
    queue.add_action(a.clone()).unwrap();

    let weak = Arc::downgrade(&queue);
    let stopper = Action::simple("stop queue", move |_| {
        if let Some(queue) = weak.upgrade() {
            queue.stop();
        }
        Ok(())
    });
    queue.set_pre_hooks(hooks(vec![stopper])).unwrap();
    queue.set_post_hooks(hooks(vec![recording("post", &log)])).unwrap();

    assert_eq!(queue.start().unwrap(), QueueOutcome::Interrupted);
    assert_eq!(a.status(), Status::Interrupted);
    assert!(log.lock().is_empty());
}

#[test]
fn test_stop_before_start_interrupts_that_run_only() {
    let log = journal();
    let queue = ActionQueue::new();
    let a = recording("A", &log);
    queue.add_action(a.clone()).unwrap();

    queue.stop();
    assert_eq!(queue.start().unwrap(), QueueOutcome::Interrupted);
    assert_eq!(a.status(), Status::Interrupted);
    assert!(log.lock().is_empty());

    assert_eq!(queue.start().unwrap(), QueueOutcome::Success);
    assert_eq!(*log.lock(), vec!["A"]);
}

#[test]
fn test_stop_and_resume_continues_at_interrupted_action() {
    let log = journal();
    let runs = Arc::new(AtomicUsize::new(0));

    let blocking = {
        let runs = Arc::clone(&runs);
        let log = Arc::clone(&log);
        Action::simple("B", move |ctx| {
            log.lock().push("B".to_string());
            if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                ctx.sleep(Duration::from_secs(30))?;
            }
            Ok(())
        })
    };

    let queue = Arc::new(ActionQueue::new());
    queue.add_action(recording("A", &log)).unwrap();
    queue.add_action(blocking.clone()).unwrap();
    queue.add_action(recording("C", &log)).unwrap();
    queue.set_post_hooks(hooks(vec![recording("post", &log)])).unwrap();

    let runner = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.start())
    };
    wait_until(|| blocking.status() == Status::Running);
    assert!(queue.current_action().unwrap().same_as(&blocking));

    queue.stop();
    assert_eq!(runner.join().unwrap().unwrap(), QueueOutcome::Interrupted);
    assert_eq!(blocking.status(), Status::Interrupted);
    assert_eq!(queue.get(2).unwrap().status(), Status::NotStarted);
    assert_eq!(*log.lock(), vec!["A", "B", "post"]);

    assert_eq!(queue.resume().unwrap(), QueueOutcome::Success);
    assert_eq!(*log.lock(), vec!["A", "B", "post", "B", "C", "post"]);
    assert_eq!(queue.get(0).unwrap().status(), Status::Completed);
}

#[test]
fn test_resume_without_interruption_runs_everything() {
    let log = journal();
    let queue = ActionQueue::new();
    queue.add_action(recording("A", &log)).unwrap();
    queue.add_action(recording("B", &log)).unwrap();

    assert_eq!(queue.start().unwrap(), QueueOutcome::Success);
    assert_eq!(queue.resume().unwrap(), QueueOutcome::Success);
    assert_eq!(*log.lock(), vec!["A", "B", "A", "B"]);
}

#[test]
fn test_edits_rejected_while_running() {
    let queue = Arc::new(ActionQueue::new());
    let blocking = Action::simple("wait", |ctx| ctx.sleep(Duration::from_secs(30)));
    queue.add_action(blocking.clone()).unwrap();

    let runner = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.start())
    };
    wait_until(|| blocking.status() == Status::Running);

    assert!(matches!(
        queue.add_action(Action::simple("late", |_| Ok(()))),
        Err(SequencerError::QueueRunning)
    ));
    assert!(matches!(queue.clear_actions(), Err(SequencerError::QueueRunning)));
    assert!(matches!(queue.start(), Err(SequencerError::QueueRunning)));
    assert!(matches!(
        queue.set_post_hooks(None),
        Err(SequencerError::QueueRunning)
    ));

    queue.stop();
    assert_eq!(runner.join().unwrap().unwrap(), QueueOutcome::Interrupted);
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_current_action_listener_sees_each_action() {
    let log = journal();
    let queue = ActionQueue::new();
    queue.add_action(recording("A", &log)).unwrap();
    queue.add_action(recording("B", &log)).unwrap();

    let seen = journal();
    let sink = Arc::clone(&seen);
    queue.add_current_listener(move |current| {
        let entry = current.as_ref().map_or("-".to_string(), Action::name);
        sink.lock().push(entry);
    });

    queue.start().unwrap();
    assert_eq!(*seen.lock(), vec!["A", "-", "B", "-"]);
    assert_eq!(queue.last_action().unwrap().name(), "B");
    assert!(queue.current_action().is_none());
}
