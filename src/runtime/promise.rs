//! Promise Implementation
//!
//! This module provides a Promise/A+ compliant settlement cell. A
//! [`Promise`] starts pending, is settled at most once through its
//! [`Resolve`]/[`Reject`] entry points, and runs continuations registered
//! with [`Promise::then_with`] on its [`Scheduler`](crate::event_loop::Scheduler),
//! never synchronously.
//!
//! Settlement happens in two steps. The first effective call to an entry
//! point locks the cell, so every later call is ignored. The transition to
//! `Fulfilled`/`Rejected` and the draining of continuations is then queued
//! as a task, which keeps handlers from running before `then` has returned
//! even when the executor settles synchronously.

use super::resolver;
use super::value::{Callback, SettledOutcome, Value};
use crate::error::{Error, Result};
use crate::event_loop::SchedulerRef;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// ID counter for Promise tracking
static PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// Promise state enum
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromiseState {
    /// Promise is pending - not yet settled
    Pending,
    /// Promise is fulfilled with a value
    Fulfilled,
    /// Promise is rejected with a reason
    Rejected,
}

/// A continuation waiting on a promise, invoked with the settled value or reason
pub(crate) type Reaction = Box<dyn FnOnce(Value)>;

/// A `then`/`catch` handler. `Err` rejects the bridge promise.
pub type Handler = Box<dyn FnOnce(Value) -> Result<Value>>;

struct SettlementCell {
    state: PromiseState,
    /// Fulfilment value, set only when `Fulfilled`
    result: Option<Value>,
    /// Rejection reason, set only when `Rejected`
    fault: Option<Value>,
    /// Set by the first effective resolve/reject call
    locked: bool,
    on_fulfilled: Vec<Reaction>,
    on_rejected: Vec<Reaction>,
}

struct PromiseInner {
    id: u64,
    cell: RefCell<SettlementCell>,
    scheduler: SchedulerRef,
}

/// A deferred value settled exactly once.
///
/// Cloning yields another handle to the same promise.
#[derive(Clone)]
pub struct Promise {
    inner: Rc<PromiseInner>,
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl Promise {
    /// Create a new pending promise nobody holds the entry points of yet
    pub(crate) fn pending(scheduler: &SchedulerRef) -> Promise {
        let id = PROMISE_ID.fetch_add(1, Ordering::Relaxed);
        Promise {
            inner: Rc::new(PromiseInner {
                id,
                cell: RefCell::new(SettlementCell {
                    state: PromiseState::Pending,
                    result: None,
                    fault: None,
                    locked: false,
                    on_fulfilled: Vec::new(),
                    on_rejected: Vec::new(),
                }),
                scheduler: scheduler.clone(),
            }),
        }
    }

    /// Create a promise and run `executor` synchronously with its entry points.
    ///
    /// An `Err` returned by the executor rejects the promise, unless it was
    /// already resolved or rejected.
    pub fn new<F>(scheduler: &SchedulerRef, executor: F) -> Promise
    where
        F: FnOnce(Resolve, Reject) -> Result<()>,
    {
        let promise = Promise::pending(scheduler);
        let (resolve, reject) = promise.resolving_functions();
        if let Err(fault) = executor(resolve, reject.clone()) {
            tracing::debug!(promise = promise.id(), %fault, "executor fault routed to rejection");
            reject.call(fault.into_reason());
        }
        promise
    }

    /// Entry points settling this promise
    pub(crate) fn resolving_functions(&self) -> (Resolve, Reject) {
        (
            Resolve {
                promise: self.clone(),
            },
            Reject {
                promise: self.clone(),
            },
        )
    }

    /// The scheduler continuations of this promise run on
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.inner.scheduler
    }

    /// Unique id, for logging
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether both handles refer to the same promise
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn state(&self) -> PromiseState {
        self.inner.cell.borrow().state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Fulfilment value, if fulfilled
    pub fn value(&self) -> Option<Value> {
        self.inner.cell.borrow().result.clone()
    }

    /// Rejection reason, if rejected
    pub fn reason(&self) -> Option<Value> {
        self.inner.cell.borrow().fault.clone()
    }

    /// Settled outcome, or `None` while pending
    pub fn outcome(&self) -> Option<SettledOutcome> {
        let cell = self.inner.cell.borrow();
        match cell.state {
            PromiseState::Pending => None,
            PromiseState::Fulfilled => Some(SettledOutcome::Fulfilled {
                value: cell.result.clone().unwrap_or_default(),
            }),
            PromiseState::Rejected => Some(SettledOutcome::Rejected {
                reason: cell.fault.clone().unwrap_or_default(),
            }),
        }
    }

    /// Claim the right to settle this promise. Only the first call succeeds.
    fn try_lock(&self) -> bool {
        let mut cell = self.inner.cell.borrow_mut();
        if cell.locked || cell.state != PromiseState::Pending {
            return false;
        }
        cell.locked = true;
        true
    }

    /// Queue the transition to `Fulfilled`
    pub(crate) fn fulfill(&self, value: Value) {
        self.schedule_transition(SettledOutcome::Fulfilled { value });
    }

    /// Queue the transition to `Rejected`
    pub(crate) fn reject_with(&self, reason: Value) {
        self.schedule_transition(SettledOutcome::Rejected { reason });
    }

    fn schedule_transition(&self, outcome: SettledOutcome) {
        let promise = self.clone();
        self.inner
            .scheduler
            .schedule(Box::new(move || promise.transition(outcome)));
    }

    /// Move to a terminal state and drain the matching continuations
    fn transition(&self, outcome: SettledOutcome) {
        let (reactions, value) = {
            let mut cell = self.inner.cell.borrow_mut();
            if cell.state != PromiseState::Pending {
                tracing::trace!(promise = self.id(), "transition on settled promise ignored");
                return;
            }
            cell.locked = true;
            let on_fulfilled = std::mem::take(&mut cell.on_fulfilled);
            let on_rejected = std::mem::take(&mut cell.on_rejected);
            match outcome {
                SettledOutcome::Fulfilled { value } => {
                    cell.state = PromiseState::Fulfilled;
                    cell.result = Some(value.clone());
                    (on_fulfilled, value)
                }
                SettledOutcome::Rejected { reason } => {
                    cell.state = PromiseState::Rejected;
                    cell.fault = Some(reason.clone());
                    (on_rejected, reason)
                }
            }
        };

        tracing::trace!(
            promise = self.id(),
            state = ?self.state(),
            reactions = reactions.len(),
            "promise settled"
        );
        for reaction in reactions {
            reaction(value.clone());
        }
    }

    /// Register continuations for both outcomes.
    ///
    /// On a settled promise the matching continuation is queued on the
    /// scheduler instead, since no further transition will happen.
    pub(crate) fn subscribe(&self, on_fulfilled: Reaction, on_rejected: Reaction) {
        let (reaction, value) = {
            let mut cell = self.inner.cell.borrow_mut();
            match cell.state {
                PromiseState::Pending => {
                    cell.on_fulfilled.push(on_fulfilled);
                    cell.on_rejected.push(on_rejected);
                    return;
                }
                PromiseState::Fulfilled => (on_fulfilled, cell.result.clone().unwrap_or_default()),
                PromiseState::Rejected => (on_rejected, cell.fault.clone().unwrap_or_default()),
            }
        };
        self.inner
            .scheduler
            .schedule(Box::new(move || reaction(value)));
    }

    /// Wrap a handler in a continuation that settles this bridge promise
    /// with the handler's outcome
    fn continuation(&self, handler: Handler) -> Reaction {
        let bridge = self.clone();
        Box::new(move |input| {
            let (resolve, reject) = bridge.resolving_functions();
            match handler(input) {
                Ok(x) => resolve.call(x),
                Err(fault) => {
                    tracing::debug!(promise = bridge.id(), %fault, "handler fault routed to rejection");
                    reject.call(fault.into_reason());
                }
            }
        })
    }

    /// Attach optional fulfilment and rejection handlers.
    ///
    /// Returns a new bridge promise settled with the outcome of whichever
    /// handler runs. A missing fulfilment handler passes the value through;
    /// a missing rejection handler passes the reason through.
    pub fn then_with(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let bridge = Promise::pending(&self.inner.scheduler);

        let on_fulfilled: Handler = match on_fulfilled {
            Some(handler) => handler,
            None => Box::new(|value: Value| -> Result<Value> { Ok(value) }),
        };
        let on_rejected: Handler = match on_rejected {
            Some(handler) => handler,
            None => Box::new(|reason: Value| -> Result<Value> { Err(Error::Thrown(reason)) }),
        };

        self.subscribe(
            bridge.continuation(on_fulfilled),
            bridge.continuation(on_rejected),
        );
        bridge
    }

    /// `.then(onFulfilled)`
    pub fn then<F>(&self, on_fulfilled: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value> + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), None)
    }

    /// `.then(onFulfilled, onRejected)`
    pub fn then_both<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise
    where
        F: FnOnce(Value) -> Result<Value> + 'static,
        R: FnOnce(Value) -> Result<Value> + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), Some(Box::new(on_rejected)))
    }

    /// `.catch(onRejected)` - shorthand for `.then(undefined, onRejected)`
    pub fn catch<R>(&self, on_rejected: R) -> Promise
    where
        R: FnOnce(Value) -> Result<Value> + 'static,
    {
        self.then_with(None, Some(Box::new(on_rejected)))
    }

    /// `.finally(onFinally)`
    ///
    /// Runs `on_finally` on either outcome and waits for what it returns;
    /// the original outcome then passes through. A fault in `on_finally`, or
    /// a rejection of what it returned, replaces the outcome.
    pub fn finally<F>(&self, on_finally: F) -> Promise
    where
        F: FnOnce() -> Result<Value> + 'static,
    {
        let on_finally = Rc::new(RefCell::new(Some(on_finally)));
        let on_finally_rejected = on_finally.clone();
        let scheduler = self.inner.scheduler.clone();
        let scheduler_rejected = scheduler.clone();

        self.then_both(
            move |value| {
                let f = on_finally
                    .borrow_mut()
                    .take()
                    .ok_or_else(|| Error::internal("finally handler already ran"))?;
                let settled = Promise::resolve(&scheduler, f()?);
                Ok(settled.then(move |_| Ok(value)).into())
            },
            move |reason| {
                let f = on_finally_rejected
                    .borrow_mut()
                    .take()
                    .ok_or_else(|| Error::internal("finally handler already ran"))?;
                let settled = Promise::resolve(&scheduler_rejected, f()?);
                Ok(settled.then(move |_| Err(Error::Thrown(reason))).into())
            },
        )
    }
}

/// Resolve entry point of a promise
#[derive(Clone, Debug)]
pub struct Resolve {
    promise: Promise,
}

impl Resolve {
    /// Resolve the promise. Promises and thenables are adopted; anything
    /// else fulfils it. Ignored once the promise is locked.
    pub fn call(&self, value: impl Into<Value>) {
        if !self.promise.try_lock() {
            tracing::trace!(promise = self.promise.id(), "resolve ignored, already settled");
            return;
        }
        resolver::resolve_promise(&self.promise, value.into());
    }

    /// The promise this entry point settles
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Convert into a callback, e.g. to hand to a foreign `then`
    pub fn into_callback(self) -> Callback {
        Rc::new(move |value: Value| self.call(value))
    }
}

/// Reject entry point of a promise
#[derive(Clone, Debug)]
pub struct Reject {
    promise: Promise,
}

impl Reject {
    /// Reject the promise. Ignored once the promise is locked.
    pub fn call(&self, reason: impl Into<Value>) {
        if !self.promise.try_lock() {
            tracing::trace!(promise = self.promise.id(), "reject ignored, already settled");
            return;
        }
        self.promise.reject_with(reason.into());
    }

    /// The promise this entry point settles
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Convert into a callback, e.g. to hand to a foreign `then`
    pub fn into_callback(self) -> Callback {
        Rc::new(move |reason: Value| self.call(reason))
    }
}
