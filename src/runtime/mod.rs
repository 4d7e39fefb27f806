//! Promise runtime for promissory
//!
//! This module provides the settlement cell ([`Promise`]), the resolution
//! procedure, the combinators and the value types promises settle with.

mod combinators;
mod deferred;
mod promise;
mod resolver;
mod value;

pub use deferred::Deferred;
pub use promise::{Handler, Promise, PromiseState, Reject, Resolve};
pub use value::{
    Callback, ErrorValue, SettledOutcome, ThenMethod, Thenable, ThenableObject, Value,
};
