//! Deferred handles
//!
//! A promise together with its resolve/reject entry points, for code that
//! settles promises imperatively (test drivers, host callbacks).

use super::promise::{Promise, Reject, Resolve};
use super::value::Value;
use crate::event_loop::SchedulerRef;

/// `{ promise, resolve, reject }`
#[derive(Clone, Debug)]
pub struct Deferred {
    promise: Promise,
    resolve: Resolve,
    reject: Reject,
}

impl Deferred {
    /// Create a pending promise along with its entry points
    pub fn new(scheduler: &SchedulerRef) -> Self {
        let mut stash = None;
        let promise = Promise::new(scheduler, |resolve, reject| {
            stash = Some((resolve, reject));
            Ok(())
        });
        // The executor always runs, so the stash is filled
        let (resolve, reject) = stash.unwrap_or_else(|| promise.resolving_functions());
        Self {
            promise,
            resolve,
            reject,
        }
    }

    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Resolve the promise with a value
    pub fn resolve(&self, value: impl Into<Value>) {
        self.resolve.call(value);
    }

    /// Reject the promise with a reason
    pub fn reject(&self, reason: impl Into<Value>) {
        self.reject.call(reason);
    }

    pub fn resolver(&self) -> &Resolve {
        &self.resolve
    }

    pub fn rejecter(&self) -> &Reject {
        &self.reject
    }

    pub fn into_parts(self) -> (Promise, Resolve, Reject) {
        (self.promise, self.resolve, self.reject)
    }
}

impl Promise {
    /// `Promise.withResolvers()`
    pub fn deferred(scheduler: &SchedulerRef) -> Deferred {
        Deferred::new(scheduler)
    }
}
