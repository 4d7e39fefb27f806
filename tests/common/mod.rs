//! Shared test helpers for integration tests

use promissory::{EventLoop, Promise, SchedulerRef, SettledOutcome, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// A fresh event loop and its scheduler handle
pub fn setup() -> (EventLoop, SchedulerRef) {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    (event_loop, scheduler)
}

/// Drain the loop, including timers, and return the promise's outcome
pub fn settle(event_loop: &EventLoop, promise: &Promise) -> Option<SettledOutcome> {
    event_loop.run_to_completion();
    promise.outcome()
}

/// Shorthand for a fulfilled outcome
#[allow(dead_code)]
pub fn fulfilled(value: impl Into<Value>) -> Option<SettledOutcome> {
    Some(SettledOutcome::Fulfilled {
        value: value.into(),
    })
}

/// Shorthand for a rejected outcome
#[allow(dead_code)]
pub fn rejected(reason: impl Into<Value>) -> Option<SettledOutcome> {
    Some(SettledOutcome::Rejected {
        reason: reason.into(),
    })
}

/// Ordered record of events observed by handlers
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct Log(Rc<RefCell<Vec<String>>>);

#[allow(dead_code)]
impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
}
