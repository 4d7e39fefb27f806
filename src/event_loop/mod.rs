//! Event Loop Implementation
//!
//! This module provides the task queue promises are scheduled on. Promises
//! only see the [`Scheduler`] trait: "run this action after the current
//! synchronous execution completes", FIFO across every submission. The
//! [`EventLoop`] is the reference implementation, with a microtask queue for
//! scheduled promise work and a virtual-time timer queue that host code and
//! tests use to simulate delayed settlement.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A zero-argument unit of deferred work
pub type Task = Box<dyn FnOnce()>;

/// Shared handle to a scheduler
pub type SchedulerRef = Rc<dyn Scheduler>;

/// A FIFO task queue.
///
/// Implementations must run every scheduled task strictly after the
/// synchronous code that scheduled it has returned, in submission order.
pub trait Scheduler {
    /// Queue a task
    fn schedule(&self, task: Task);
}

/// Identifier of a pending timer
pub type TimerId = u64;

/// A timer task to be executed (setTimeout-style host glue)
struct Timer {
    /// Unique timer ID
    id: TimerId,
    /// When the timer should fire (virtual time in ms)
    fire_at: u64,
    /// The task to run
    task: Task,
}

/// Event loop configuration
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Maximum microtasks to drain per tick (starvation protection)
    pub microtask_budget: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            microtask_budget: 10_000,
        }
    }
}

/// Result of running the event loop to completion via `run_to_completion()`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    /// Total number of microtasks that were dequeued and processed
    pub microtasks_processed: usize,
    /// Total number of timers that fired
    pub timers_fired: usize,
    /// Number of full event loop iterations
    pub iterations: usize,
    /// The virtual time when the event loop finished
    pub final_time: u64,
}

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default, Serialize)]
pub struct EventLoopStats {
    /// Total microtasks processed across all ticks
    pub total_microtasks: u64,
    /// Total timers fired
    pub total_timers_fired: u64,
    /// Total number of event loop ticks
    pub total_ticks: u64,
    /// Maximum microtasks drained in a single tick
    pub max_microtasks_per_tick: u64,
}

struct EventLoopInner {
    /// Microtask queue (scheduled promise work)
    microtasks: RefCell<VecDeque<Task>>,
    /// Timer queue
    timers: RefCell<Vec<Timer>>,
    /// Current virtual time in milliseconds
    virtual_time: Cell<u64>,
    /// Next timer ID
    next_timer_id: Cell<TimerId>,
    config: RefCell<EventLoopConfig>,
    stats: RefCell<EventLoopStats>,
}

/// The event loop manages task queues and execution order.
///
/// Cloning yields another handle to the same queues.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<EventLoopInner>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending_microtasks", &self.pending_microtasks())
            .field("pending_timers", &self.pending_timers())
            .field("virtual_time", &self.current_time())
            .finish()
    }
}

impl Scheduler for EventLoop {
    fn schedule(&self, task: Task) {
        self.enqueue_microtask(task);
    }
}

impl EventLoop {
    /// Create a new event loop
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    /// Create a new event loop with the given configuration
    ///
    /// A budget of zero is raised to one.
    pub fn with_config(mut config: EventLoopConfig) -> Self {
        config.microtask_budget = config.microtask_budget.max(1);
        Self {
            inner: Rc::new(EventLoopInner {
                microtasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(Vec::new()),
                virtual_time: Cell::new(0),
                next_timer_id: Cell::new(1),
                config: RefCell::new(config),
                stats: RefCell::new(EventLoopStats::default()),
            }),
        }
    }

    /// Get a scheduler handle to hand to promises
    pub fn scheduler(&self) -> SchedulerRef {
        Rc::new(self.clone())
    }

    /// Get current virtual time
    pub fn current_time(&self) -> u64 {
        self.inner.virtual_time.get()
    }

    /// Advance virtual time
    pub fn advance_time(&self, ms: u64) {
        self.inner.virtual_time.set(self.current_time().saturating_add(ms));
    }

    /// Enqueue a microtask
    pub fn enqueue_microtask(&self, task: Task) {
        self.inner.microtasks.borrow_mut().push_back(task);
    }

    /// Enqueue a closure as a microtask
    pub fn queue_microtask(&self, f: impl FnOnce() + 'static) {
        self.enqueue_microtask(Box::new(f));
    }

    /// Schedule a timer that fires `delay` virtual milliseconds from now
    pub fn set_timeout(&self, delay: u64, f: impl FnOnce() + 'static) -> TimerId {
        let id = self.inner.next_timer_id.get();
        self.inner.next_timer_id.set(id + 1);

        let fire_at = self.current_time().saturating_add(delay);
        self.inner.timers.borrow_mut().push(Timer {
            id,
            fire_at,
            task: Box::new(f),
        });
        tracing::trace!(timer = id, fire_at, "timer scheduled");
        id
    }

    /// Cancel a timer by ID. Returns whether a pending timer was removed.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut timers = self.inner.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        timers.len() != before
    }

    /// Number of queued microtasks
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().len()
    }

    /// Number of pending timers
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Check if there are pending microtasks
    pub fn has_pending_microtasks(&self) -> bool {
        self.pending_microtasks() > 0
    }

    /// Check if the event loop has any pending work
    pub fn has_pending_work(&self) -> bool {
        self.has_pending_microtasks() || self.pending_timers() > 0
    }

    fn dequeue_microtask(&self) -> Option<Task> {
        // The borrow must end before the task runs; tasks schedule more tasks.
        self.inner.microtasks.borrow_mut().pop_front()
    }

    /// Drain microtasks up to the budget, including ones queued while
    /// draining. Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        let budget = self.microtask_budget().max(1);
        let mut count: usize = 0;

        while count < budget {
            let Some(task) = self.dequeue_microtask() else {
                break;
            };
            task();
            count += 1;
        }

        let mut stats = self.inner.stats.borrow_mut();
        stats.total_microtasks += count as u64;
        if (count as u64) > stats.max_microtasks_per_tick {
            stats.max_microtasks_per_tick = count as u64;
        }
        if count == budget && self.has_pending_microtasks() {
            tracing::debug!(budget, "microtask budget exhausted, yielding");
        }
        count
    }

    /// Remove the earliest timer due at or before the current virtual time
    fn take_ready_timer(&self) -> Option<Timer> {
        let now = self.current_time();
        let mut timers = self.inner.timers.borrow_mut();
        let idx = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.fire_at <= now)
            .min_by_key(|(_, t)| (t.fire_at, t.id))
            .map(|(i, _)| i)?;
        Some(timers.remove(idx))
    }

    /// Get the time of the next scheduled timer
    pub fn next_timer_time(&self) -> Option<u64> {
        self.inner.timers.borrow().iter().map(|t| t.fire_at).min()
    }

    /// Fire the next timer, advancing virtual time to it if needed.
    /// Returns `false` if no timer is pending.
    pub fn fire_next_timer(&self) -> bool {
        let Some(fire_at) = self.next_timer_time() else {
            return false;
        };
        if fire_at > self.current_time() {
            self.inner.virtual_time.set(fire_at);
        }
        match self.take_ready_timer() {
            Some(timer) => {
                tracing::trace!(timer = timer.id, at = fire_at, "timer fired");
                (timer.task)();
                self.inner.stats.borrow_mut().total_timers_fired += 1;
                true
            }
            None => false,
        }
    }

    /// Run the event loop to completion:
    ///   1. Drain all microtasks
    ///   2. Fire the next timer (advance time if needed)
    ///   3. Repeat from step 1
    ///   4. Stop when no microtasks and no timers remain
    ///
    /// Returns a `RunResult` with statistics about what was processed.
    pub fn run_to_completion(&self) -> RunResult {
        let mut result = RunResult::default();

        loop {
            result.microtasks_processed += self.run_microtasks();

            // A budget-limited drain leaves work behind; finish it before timers.
            let fired = !self.has_pending_microtasks() && self.fire_next_timer();

            self.inner.stats.borrow_mut().total_ticks += 1;

            if fired {
                result.timers_fired += 1;
                result.iterations += 1;
                continue;
            }

            if !self.has_pending_microtasks() {
                break;
            }

            result.iterations += 1;
        }

        result.final_time = self.current_time();
        result
    }

    /// Set the maximum number of microtasks to drain per tick
    pub fn set_microtask_budget(&self, limit: usize) {
        self.inner.config.borrow_mut().microtask_budget = limit.max(1);
    }

    /// Get the current microtask budget limit
    pub fn microtask_budget(&self) -> usize {
        self.inner.config.borrow().microtask_budget
    }

    /// Get a snapshot of the current event loop statistics
    pub fn stats(&self) -> EventLoopStats {
        self.inner.stats.borrow().clone()
    }

    /// Reset all event loop statistics to zero
    pub fn reset_stats(&self) {
        *self.inner.stats.borrow_mut() = EventLoopStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &'static str| -> Box<dyn FnOnce()> {
            let log = log_clone.clone();
            Box::new(move || log.borrow_mut().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_event_loop_creation() {
        let el = EventLoop::new();
        assert_eq!(el.current_time(), 0);
        assert!(!el.has_pending_work());
        assert_eq!(el.microtask_budget(), 10_000);
    }

    #[test]
    fn test_microtasks_run_in_fifo_order() {
        let el = EventLoop::new();
        let (log, make) = recorder();

        el.enqueue_microtask(make("a"));
        el.enqueue_microtask(make("b"));
        el.enqueue_microtask(make("c"));
        assert!(log.borrow().is_empty());

        assert_eq!(el.run_microtasks(), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_nested_microtask_runs_after_queued_ones() {
        let el = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let el_inner = el.clone();
        let log_outer = log.clone();
        el.queue_microtask(move || {
            log_outer.borrow_mut().push(1);
            let log_nested = log_outer.clone();
            el_inner.queue_microtask(move || log_nested.borrow_mut().push(3));
        });
        let log_second = log.clone();
        el.queue_microtask(move || log_second.borrow_mut().push(2));

        el.run_microtasks();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_scheduler_handle_shares_queue() {
        let el = EventLoop::new();
        let scheduler = el.scheduler();
        scheduler.schedule(Box::new(|| {}));
        assert_eq!(el.pending_microtasks(), 1);
    }

    #[test]
    fn test_timers_fire_in_time_order() {
        let el = EventLoop::new();
        let (log, make) = recorder();

        let slow = make("slow");
        let fast = make("fast");
        el.set_timeout(100, slow);
        el.set_timeout(10, fast);

        let result = el.run_to_completion();
        assert_eq!(*log.borrow(), vec!["fast", "slow"]);
        assert_eq!(result.timers_fired, 2);
        assert_eq!(result.final_time, 100);
    }

    #[test]
    fn test_equal_delay_timers_keep_submission_order() {
        let el = EventLoop::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        el.set_timeout(5, first);
        el.set_timeout(5, second);
        el.run_to_completion();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_clear_timeout() {
        let el = EventLoop::new();
        let (log, make) = recorder();
        let id = el.set_timeout(10, make("never"));
        assert!(el.clear_timeout(id));
        assert!(!el.clear_timeout(id));
        el.run_to_completion();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_microtasks_drain_before_timers() {
        let el = EventLoop::new();
        let (log, make) = recorder();
        let timer = make("timer");
        el.set_timeout(0, timer);
        el.enqueue_microtask(make("micro"));
        el.run_to_completion();
        assert_eq!(*log.borrow(), vec!["micro", "timer"]);
    }

    #[test]
    fn test_microtask_budget_limits_one_drain() {
        let el = EventLoop::with_config(EventLoopConfig { microtask_budget: 2 });
        for _ in 0..5 {
            el.queue_microtask(|| {});
        }
        assert_eq!(el.run_microtasks(), 2);
        assert_eq!(el.pending_microtasks(), 3);

        // run_to_completion keeps going across budget-limited drains
        let result = el.run_to_completion();
        assert_eq!(result.microtasks_processed, 3);
        assert!(!el.has_pending_work());
    }

    #[test]
    fn test_zero_budget_still_drains() {
        let el = EventLoop::with_config(EventLoopConfig { microtask_budget: 0 });
        assert_eq!(el.microtask_budget(), 1);
        for _ in 0..3 {
            el.queue_microtask(|| {});
        }
        assert_eq!(el.run_microtasks(), 1);

        let result = el.run_to_completion();
        assert_eq!(result.microtasks_processed, 2);
        assert!(!el.has_pending_work());
    }

    #[test]
    fn test_advance_time_makes_timers_due() {
        let el = EventLoop::new();
        let (log, make) = recorder();
        el.set_timeout(10, make("due"));

        el.advance_time(15);
        assert_eq!(el.current_time(), 15);
        assert!(el.fire_next_timer());
        // Already past the deadline, so firing does not move the clock back
        assert_eq!(el.current_time(), 15);
        assert_eq!(*log.borrow(), vec!["due"]);
    }

    #[test]
    fn test_far_future_timer_saturates() {
        let el = EventLoop::new();
        el.set_timeout(5, || {});
        el.run_to_completion();

        el.set_timeout(u64::MAX, || {});
        assert_eq!(el.next_timer_time(), Some(u64::MAX));
        el.advance_time(u64::MAX);
        assert_eq!(el.current_time(), u64::MAX);
        assert!(el.fire_next_timer());
    }

    #[test]
    fn test_stats_tracking() {
        let el = EventLoop::new();
        el.queue_microtask(|| {});
        el.queue_microtask(|| {});
        el.set_timeout(1, || {});
        el.run_to_completion();

        let stats = el.stats();
        assert_eq!(stats.total_microtasks, 2);
        assert_eq!(stats.total_timers_fired, 1);
        assert_eq!(stats.max_microtasks_per_tick, 2);
        assert!(stats.total_ticks >= 2);

        el.reset_stats();
        assert_eq!(el.stats().total_microtasks, 0);
    }
}
