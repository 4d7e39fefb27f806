//! Error types for promissory
//!
//! Faults raised by executors, handlers and foreign thenables are carried as
//! [`Error`] values and converted into rejection reasons with
//! [`Error::into_reason`]. They never escape past the promise API boundary.

use crate::runtime::{ErrorValue, Value};
use std::fmt;
use thiserror::Error;

/// Main error type for promissory
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// An arbitrary value raised by user code (executor, handler, thenable)
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// A promise was resolved with itself
    #[error("TypeError: Circular reference")]
    CircularReference,

    /// Typed runtime error - TypeError, AggregateError, etc.
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// Internal error
    #[error("InternalError: {0}")]
    InternalError(String),
}

/// Error kinds surfaced as rejection reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation
    TypeError,
    /// AggregateError - every input of `Promise::any` rejected
    AggregateError,
    /// Generic Error - user-thrown Error objects
    GenericError,
    /// InternalError - internal engine error
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TypeError => write!(f, "TypeError"),
            ErrorKind::AggregateError => write!(f, "AggregateError"),
            ErrorKind::GenericError => write!(f, "Error"),
            ErrorKind::InternalError => write!(f, "InternalError"),
        }
    }
}

impl Error {
    /// Raise an arbitrary value, like a JavaScript `throw`
    pub fn throw(value: impl Into<Value>) -> Self {
        Error::Thrown(value.into())
    }

    /// Create a new type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::GenericError,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::InternalError(message.into())
    }

    /// Get the error kind, if this error carries one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Thrown(_) => None,
            Error::CircularReference => Some(ErrorKind::TypeError),
            Error::RuntimeError { kind, .. } => Some(*kind),
            Error::InternalError(_) => Some(ErrorKind::InternalError),
        }
    }

    /// Convert the fault into the value a promise is rejected with.
    ///
    /// Thrown values are passed through untouched; every other variant
    /// becomes an error object.
    pub fn into_reason(self) -> Value {
        match self {
            Error::Thrown(value) => value,
            Error::CircularReference => {
                Value::Error(ErrorValue::new(ErrorKind::TypeError, "Circular reference"))
            }
            Error::RuntimeError { kind, message } => Value::Error(ErrorValue::new(kind, message)),
            Error::InternalError(message) => {
                Value::Error(ErrorValue::new(ErrorKind::InternalError, message))
            }
        }
    }
}

impl From<Error> for Value {
    fn from(error: Error) -> Self {
        error.into_reason()
    }
}

/// Result type alias for promissory
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thrown_value_passes_through() {
        let reason = Error::throw("boom").into_reason();
        assert_eq!(reason, Value::from("boom"));
    }

    #[test]
    fn test_circular_reference_is_type_error() {
        let err = Error::CircularReference;
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
        assert_eq!(err.to_string(), "TypeError: Circular reference");

        match err.into_reason() {
            Value::Error(e) => {
                assert_eq!(e.kind, ErrorKind::TypeError);
                assert_eq!(e.message, "Circular reference");
            }
            other => panic!("Expected error object, got {:?}", other),
        }
    }

    #[test]
    fn test_runtime_error_display() {
        let err = Error::type_error("not a function");
        assert_eq!(err.to_string(), "TypeError: not a function");
        assert_eq!(err.into_reason().to_string(), "TypeError: not a function");
    }

    #[test]
    fn test_generic_error_display() {
        let err = Error::generic("boom");
        assert_eq!(err.kind(), Some(ErrorKind::GenericError));
        assert_eq!(err.to_string(), "Error: boom");
        assert_eq!(err.into_reason().to_string(), "Error: boom");
    }

    #[test]
    fn test_thrown_has_no_kind() {
        assert_eq!(Error::throw(1).kind(), None);
        assert_eq!(Error::internal("x").kind(), Some(ErrorKind::InternalError));
    }
}
