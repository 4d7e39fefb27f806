//! Promise resolution procedure
//!
//! Decides whether a value fulfils a promise directly or has to be awaited
//! first because it is itself a promise or a foreign thenable. Foreign
//! objects are recognised by capability (a callable `then` member), not by
//! type, so promises from other implementations interoperate.

use super::promise::Promise;
use super::value::{Callback, SettledOutcome, Thenable, Value};
use crate::error::Error;
use std::cell::Cell;
use std::rc::Rc;

/// How a resolution value has to be handled, decided once per step
enum Candidate {
    /// Stored as-is
    Plain(Value),
    /// A promise of this crate, adopted
    Cell(Promise),
    /// A foreign object that may expose `then`
    Foreign(Rc<dyn Thenable>),
}

impl Candidate {
    fn classify(x: Value) -> Candidate {
        match x {
            Value::Promise(p) => Candidate::Cell(p),
            Value::Object(object) => Candidate::Foreign(object),
            other => Candidate::Plain(other),
        }
    }
}

/// Claim-once guard shared by the callbacks handed to one foreign `then`
#[derive(Debug, Default)]
pub(crate) struct ClaimOnce(Cell<bool>);

impl ClaimOnce {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first call only
    pub(crate) fn claim(&self) -> bool {
        !self.0.replace(true)
    }
}

/// Settle `bridge` with `x`, unwrapping promises and thenables
pub(crate) fn resolve_promise(bridge: &Promise, x: Value) {
    match Candidate::classify(x) {
        Candidate::Cell(source) if source.ptr_eq(bridge) => {
            tracing::debug!(promise = bridge.id(), "promise resolved with itself");
            bridge.reject_with(Error::CircularReference.into_reason());
        }
        Candidate::Cell(source) => adopt_promise(bridge, &source),
        Candidate::Foreign(object) => adopt_thenable(bridge, object),
        Candidate::Plain(value) => bridge.fulfill(value),
    }
}

/// Follow another promise of this crate
fn adopt_promise(bridge: &Promise, source: &Promise) {
    if let Some(outcome) = source.outcome() {
        match outcome {
            SettledOutcome::Fulfilled { value } => bridge.fulfill(value),
            SettledOutcome::Rejected { reason } => bridge.reject_with(reason),
        }
        return;
    }

    let on_fulfilled = bridge.clone();
    let on_rejected = bridge.clone();
    source.subscribe(
        Box::new(move |value: Value| resolve_promise(&on_fulfilled, value)),
        Box::new(move |reason: Value| on_rejected.reject_with(reason)),
    );
}

/// Read `then` off a foreign object and let it drive the bridge
fn adopt_thenable(bridge: &Promise, object: Rc<dyn Thenable>) {
    let claim = Rc::new(ClaimOnce::new());

    let then = match object.then_method() {
        Ok(Some(then)) => then,
        Ok(None) => {
            bridge.fulfill(Value::Object(object));
            return;
        }
        Err(fault) => {
            if claim.claim() {
                tracing::debug!(promise = bridge.id(), %fault, "reading then faulted");
                bridge.reject_with(fault.into_reason());
            }
            return;
        }
    };

    let resolve: Callback = {
        let bridge = bridge.clone();
        let claim = claim.clone();
        Rc::new(move |y: Value| {
            if claim.claim() {
                resolve_promise(&bridge, y);
            } else {
                tracing::trace!(promise = bridge.id(), "thenable resolve ignored, already claimed");
            }
        })
    };
    let reject: Callback = {
        let bridge = bridge.clone();
        let claim = claim.clone();
        Rc::new(move |reason: Value| {
            if claim.claim() {
                bridge.reject_with(reason);
            } else {
                tracing::trace!(promise = bridge.id(), "thenable reject ignored, already claimed");
            }
        })
    };

    if let Err(fault) = then(resolve, reject) {
        if claim.claim() {
            tracing::debug!(promise = bridge.id(), %fault, "calling then faulted");
            bridge.reject_with(fault.into_reason());
        } else {
            tracing::trace!(promise = bridge.id(), "fault after claim ignored");
        }
    }
}
