//! Promissory: a Promises/A+ deferred-value primitive
//!
//! A [`Promise`] is a value container that starts pending, is settled exactly
//! once, and runs continuations attached with `then` after settlement,
//! never synchronously. Continuations run on an injectable
//! [`Scheduler`](event_loop::Scheduler); [`EventLoop`] is the reference
//! FIFO implementation.
//!
//! # Quick Start
//!
//! ```no_run
//! use promissory::{EventLoop, Promise, Value};
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let doubled = Promise::new(&scheduler, |resolve, _reject| {
//!     resolve.call(21);
//!     Ok(())
//! })
//! .then(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) * 2.0)));
//!
//! event_loop.run_to_completion();
//! assert_eq!(doubled.value(), Some(Value::from(42)));
//! ```
//!
//! # Module Overview
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`runtime`] | [`Promise`], `then`/`catch`, resolution procedure, combinators, [`Value`] |
//! | [`event_loop`] | [`Scheduler`](event_loop::Scheduler) trait and the [`EventLoop`] task queue |
//! | [`error`](Error) | [`Error`] and [`Result`] |

pub mod event_loop;
pub mod prelude;
pub mod runtime;

mod error;

pub use error::{Error, ErrorKind, Result};
pub use event_loop::{EventLoop, EventLoopConfig, Scheduler, SchedulerRef};
pub use runtime::{Deferred, Promise, PromiseState, SettledOutcome, Thenable, ThenableObject, Value};

/// Promissory version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
