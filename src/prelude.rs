//! Prelude module for convenient imports
//!
//! ```no_run
//! use promissory::prelude::*;
//!
//! let event_loop = EventLoop::new();
//! let p = Promise::resolve(&event_loop.scheduler(), 1);
//! event_loop.run_to_completion();
//! assert_eq!(p.state(), PromiseState::Fulfilled);
//! ```

// Promises
pub use crate::runtime::{
    Deferred, Handler, Promise, PromiseState, Reject, Resolve, SettledOutcome,
};

// Values and foreign thenables
pub use crate::runtime::{Callback, ErrorValue, ThenMethod, Thenable, ThenableObject, Value};

// Scheduling
pub use crate::event_loop::{EventLoop, EventLoopConfig, Scheduler, SchedulerRef};

// Error handling
pub use crate::error::{Error, ErrorKind, Result};
