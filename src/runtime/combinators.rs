//! Promise combinators
//!
//! `Promise.resolve`, `Promise.reject`, `Promise.all`, `Promise.race`,
//! `Promise.allSettled` and `Promise.any`. Each one is a new promise whose
//! executor subscribes to the inputs; inputs are never mutated.

use super::promise::{Promise, Reject, Resolve};
use super::value::{ErrorValue, SettledOutcome, Value};
use crate::event_loop::SchedulerRef;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Ordered result slots shared by the subscriptions of one combinator
struct Slots {
    values: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
}

impl Slots {
    fn new(count: usize) -> Rc<Self> {
        Rc::new(Self {
            values: RefCell::new(vec![Value::Undefined; count]),
            remaining: Cell::new(count),
        })
    }

    /// Fill slot `index`; returns every value once the last slot is filled
    fn fill(&self, index: usize, value: Value) -> Option<Vec<Value>> {
        self.values.borrow_mut()[index] = value;
        self.remaining.set(self.remaining.get() - 1);
        if self.remaining.get() == 0 {
            Some(std::mem::take(&mut *self.values.borrow_mut()))
        } else {
            None
        }
    }
}

impl Promise {
    /// `Promise.resolve(value)` - promises and thenables are adopted
    pub fn resolve(scheduler: &SchedulerRef, value: impl Into<Value>) -> Promise {
        let value = value.into();
        Promise::new(scheduler, move |resolve, _| {
            resolve.call(value);
            Ok(())
        })
    }

    /// `Promise.reject(reason)`
    pub fn reject(scheduler: &SchedulerRef, reason: impl Into<Value>) -> Promise {
        let reason = reason.into();
        Promise::new(scheduler, move |_, reject| {
            reject.call(reason);
            Ok(())
        })
    }

    /// `Promise.all` - fulfils with every value in input order, rejects on
    /// the first rejection
    pub fn all<I>(scheduler: &SchedulerRef, promises: I) -> Promise
    where
        I: IntoIterator<Item = Promise>,
    {
        let promises: Vec<Promise> = promises.into_iter().collect();
        Promise::new(scheduler, move |resolve, reject| {
            if promises.is_empty() {
                resolve.call(Value::Array(Vec::new()));
                return Ok(());
            }

            let slots = Slots::new(promises.len());
            for (i, promise) in promises.iter().enumerate() {
                let slots = slots.clone();
                let resolve = resolve.clone();
                let reject = reject.clone();
                promise.subscribe(
                    Box::new(move |value: Value| {
                        if let Some(values) = slots.fill(i, value) {
                            resolve.call(Value::Array(values));
                        }
                    }),
                    Box::new(move |reason: Value| reject.call(reason)),
                );
            }
            Ok(())
        })
    }

    /// `Promise.race` - settles like whichever input settles first.
    /// An empty input stays pending forever.
    pub fn race<I>(scheduler: &SchedulerRef, promises: I) -> Promise
    where
        I: IntoIterator<Item = Promise>,
    {
        let promises: Vec<Promise> = promises.into_iter().collect();
        Promise::new(scheduler, move |resolve, reject| {
            for promise in &promises {
                let resolve = resolve.clone();
                let reject = reject.clone();
                promise.subscribe(
                    Box::new(move |value: Value| resolve.call(value)),
                    Box::new(move |reason: Value| reject.call(reason)),
                );
            }
            Ok(())
        })
    }

    /// `Promise.allSettled` - fulfils with an outcome record per input, in
    /// input order, once every input has settled. Never rejects.
    pub fn all_settled<I>(scheduler: &SchedulerRef, promises: I) -> Promise
    where
        I: IntoIterator<Item = Promise>,
    {
        let promises: Vec<Promise> = promises.into_iter().collect();
        Promise::new(scheduler, move |resolve, _| {
            if promises.is_empty() {
                resolve.call(Value::Array(Vec::new()));
                return Ok(());
            }

            let slots = Slots::new(promises.len());
            for (i, promise) in promises.iter().enumerate() {
                let on_fulfilled = settle_slot(&slots, i, &resolve, |value| {
                    SettledOutcome::Fulfilled { value }
                });
                let on_rejected = settle_slot(&slots, i, &resolve, |reason| {
                    SettledOutcome::Rejected { reason }
                });
                promise.subscribe(on_fulfilled, on_rejected);
            }
            Ok(())
        })
    }

    /// `Promise.any` - fulfils with the first fulfilment; rejects with an
    /// `AggregateError` holding every reason once all inputs reject
    pub fn any<I>(scheduler: &SchedulerRef, promises: I) -> Promise
    where
        I: IntoIterator<Item = Promise>,
    {
        let promises: Vec<Promise> = promises.into_iter().collect();
        Promise::new(scheduler, move |resolve, reject| {
            if promises.is_empty() {
                reject_aggregate(&reject, Vec::new());
                return Ok(());
            }

            let slots = Slots::new(promises.len());
            for (i, promise) in promises.iter().enumerate() {
                let resolve = resolve.clone();
                let reject = reject.clone();
                let slots = slots.clone();
                promise.subscribe(
                    Box::new(move |value: Value| resolve.call(value)),
                    Box::new(move |reason: Value| {
                        if let Some(reasons) = slots.fill(i, reason) {
                            reject_aggregate(&reject, reasons);
                        }
                    }),
                );
            }
            Ok(())
        })
    }
}

fn settle_slot(
    slots: &Rc<Slots>,
    index: usize,
    resolve: &Resolve,
    record: fn(Value) -> SettledOutcome,
) -> Box<dyn FnOnce(Value)> {
    let slots = slots.clone();
    let resolve = resolve.clone();
    Box::new(move |value: Value| {
        if let Some(records) = slots.fill(index, Value::from(record(value))) {
            resolve.call(Value::Array(records));
        }
    })
}

fn reject_aggregate(reject: &Reject, reasons: Vec<Value>) {
    reject.call(ErrorValue::aggregate(reasons, "All promises were rejected"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event_loop::EventLoop;
    use crate::runtime::PromiseState;

    fn setup() -> (EventLoop, SchedulerRef) {
        let el = EventLoop::new();
        let scheduler = el.scheduler();
        (el, scheduler)
    }

    #[test]
    fn test_promise_all_empty() {
        let (el, scheduler) = setup();
        let result = Promise::all(&scheduler, vec![]);
        assert_eq!(result.state(), PromiseState::Pending);
        el.run_microtasks();
        assert_eq!(result.value(), Some(Value::Array(vec![])));
    }

    #[test]
    fn test_promise_all_keeps_input_order() {
        let (el, scheduler) = setup();
        let late = Promise::deferred(&scheduler);
        let result = Promise::all(
            &scheduler,
            vec![late.promise().clone(), Promise::resolve(&scheduler, 2)],
        );
        el.run_to_completion();
        assert!(result.is_pending());

        late.resolve(1);
        el.run_to_completion();
        assert_eq!(
            result.value(),
            Some(Value::from(vec![Value::from(1), Value::from(2)]))
        );
    }

    #[test]
    fn test_promise_all_rejects_on_first_rejection() {
        let (el, scheduler) = setup();
        let p1 = Promise::resolve(&scheduler, 1);
        let p2 = Promise::reject(&scheduler, "error");
        let p3 = Promise::reject(&scheduler, "second error");

        let result = Promise::all(&scheduler, vec![p1, p2, p3]);
        el.run_to_completion();
        assert_eq!(result.reason(), Some(Value::from("error")));
    }

    #[test]
    fn test_promise_race_first_wins() {
        let (el, scheduler) = setup();
        let p1 = Promise::deferred(&scheduler);
        let p2 = Promise::deferred(&scheduler);
        let result = Promise::race(&scheduler, vec![p1.promise().clone(), p2.promise().clone()]);

        p2.reject("fast failure");
        p1.resolve("slow success");
        el.run_to_completion();
        assert_eq!(result.reason(), Some(Value::from("fast failure")));
    }

    #[test]
    fn test_promise_race_empty_stays_pending() {
        let (el, scheduler) = setup();
        let result = Promise::race(&scheduler, Vec::new());
        el.run_to_completion();
        assert!(result.is_pending());
    }

    #[test]
    fn test_promise_all_settled_mixed() {
        let (el, scheduler) = setup();
        let p1 = Promise::resolve(&scheduler, 1);
        let p2 = Promise::reject(&scheduler, "err");

        let result = Promise::all_settled(&scheduler, vec![p1, p2]);
        el.run_to_completion();
        assert_eq!(
            result.value(),
            Some(Value::from(vec![
                Value::from(SettledOutcome::Fulfilled { value: Value::from(1) }),
                Value::from(SettledOutcome::Rejected { reason: Value::from("err") }),
            ]))
        );
    }

    #[test]
    fn test_promise_all_settled_empty() {
        let (el, scheduler) = setup();
        let result = Promise::all_settled(&scheduler, vec![]);
        el.run_to_completion();
        assert_eq!(result.value(), Some(Value::Array(vec![])));
    }

    #[test]
    fn test_promise_any_first_fulfilled() {
        let (el, scheduler) = setup();
        let p1 = Promise::reject(&scheduler, "err1");
        let p2 = Promise::resolve(&scheduler, 42);

        let result = Promise::any(&scheduler, vec![p1, p2]);
        el.run_to_completion();
        assert_eq!(result.value(), Some(Value::from(42)));
    }

    #[test]
    fn test_promise_any_rejects_with_aggregate_error() {
        let (el, scheduler) = setup();
        let p1 = Promise::reject(&scheduler, "err1");
        let p2 = Promise::reject(&scheduler, "err2");

        let result = Promise::any(&scheduler, vec![p1, p2]);
        el.run_to_completion();
        match result.reason() {
            Some(Value::Error(e)) => {
                assert_eq!(e.kind, ErrorKind::AggregateError);
                assert_eq!(e.errors, vec![Value::from("err1"), Value::from("err2")]);
            }
            other => panic!("Expected AggregateError, got {:?}", other),
        }
    }

    #[test]
    fn test_promise_any_empty() {
        let (el, scheduler) = setup();
        let result = Promise::any(&scheduler, vec![]);
        el.run_to_completion();
        assert_eq!(result.state(), PromiseState::Rejected);
    }

    #[test]
    fn test_resolve_adopts_promise() {
        let (el, scheduler) = setup();
        let inner = Promise::reject(&scheduler, "inner");
        let outer = Promise::resolve(&scheduler, inner);
        el.run_to_completion();
        assert_eq!(outer.reason(), Some(Value::from("inner")));
    }
}
