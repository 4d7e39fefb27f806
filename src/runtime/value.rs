//! Value types carried by promises
//!
//! A promise settles with a dynamically typed [`Value`]. Besides plain data,
//! a value can be another promise of this crate ([`Value::Promise`]) or a
//! foreign object that may expose a `then` member ([`Value::Object`]). The
//! resolution procedure treats those two specially; everything else is
//! stored as-is.

use super::promise::Promise;
use crate::error::{ErrorKind, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;
use std::rc::Rc;

/// A one-argument callback handed to foreign `then` members
pub type Callback = Rc<dyn Fn(Value)>;

/// A `then` member read off a foreign object. Invoked with the onward
/// resolve and reject callbacks; `Err` is a fault raised by the call itself.
pub type ThenMethod = Rc<dyn Fn(Callback, Callback) -> Result<()>>;

/// Capability check for foreign deferred values.
///
/// Any object that may expose a `then` member implements this trait. The
/// member is read exactly once per resolution step.
pub trait Thenable {
    /// Read the `then` member.
    ///
    /// Returns `Ok(None)` when the object has no callable `then`, in which
    /// case it is treated as a plain value. `Err` means reading the member
    /// faulted.
    fn then_method(&self) -> Result<Option<ThenMethod>>;
}

/// A foreign object with a fixed `then` member, or none at all
#[derive(Clone, Default)]
pub struct ThenableObject {
    then: Option<ThenMethod>,
}

impl ThenableObject {
    /// An object whose `then` member calls `f`
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Callback, Callback) -> Result<()> + 'static,
    {
        Self {
            then: Some(Rc::new(f)),
        }
    }

    /// An object without a callable `then`
    pub fn without_then() -> Self {
        Self::default()
    }
}

impl Thenable for ThenableObject {
    fn then_method(&self) -> Result<Option<ThenMethod>> {
        Ok(self.then.clone())
    }
}

/// A typed error object used as a rejection reason
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    /// Error kind (TypeError, AggregateError, ...)
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Collected reasons, only populated for `AggregateError`
    pub errors: Vec<Value>,
}

impl ErrorValue {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Create an AggregateError carrying every rejection reason in order
    pub fn aggregate(errors: Vec<Value>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::AggregateError,
            message: message.into(),
            errors,
        }
    }
}

impl Serialize for ErrorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = if self.errors.is_empty() { 2 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("name", &self.kind.to_string())?;
        map.serialize_entry("message", &self.message)?;
        if !self.errors.is_empty() {
            map.serialize_entry("errors", &self.errors)?;
        }
        map.end()
    }
}

/// Outcome record produced by `Promise::all_settled`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SettledOutcome {
    Fulfilled { value: Value },
    Rejected { reason: Value },
}

impl SettledOutcome {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SettledOutcome::Fulfilled { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SettledOutcome::Rejected { .. })
    }

    /// The fulfilment value or rejection reason
    pub fn value(&self) -> &Value {
        match self {
            SettledOutcome::Fulfilled { value } => value,
            SettledOutcome::Rejected { reason } => reason,
        }
    }
}

/// A value a promise can settle with
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Error object (TypeError, AggregateError, ...)
    Error(ErrorValue),
    /// All-settled outcome record
    Outcome(Box<SettledOutcome>),
    /// A promise of this crate
    Promise(Promise),
    /// A foreign object that may expose a `then` member
    Object(Rc<dyn Thenable>),
}

impl Value {
    /// Wrap a foreign object
    pub fn object<T: Thenable + 'static>(object: T) -> Self {
        Value::Object(Rc::new(object))
    }

    /// Whether this is an object in the JavaScript sense (non-null, non-primitive)
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Error(_) | Value::Outcome(_) | Value::Promise(_) | Value::Object(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Name of the value's type, as `typeof` would report it
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            _ => "object",
        }
    }

    /// Convert to the JavaScript string form
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.is_nan() {
                    "NaN".to_string()
                } else if n.is_infinite() {
                    if *n > 0.0 {
                        "Infinity".to_string()
                    } else {
                        "-Infinity".to_string()
                    }
                } else if *n == 0.0 {
                    "0".to_string()
                } else {
                    format!("{}", n)
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(items) => {
                let elements: Vec<String> = items.iter().map(|v| v.to_js_string()).collect();
                elements.join(",")
            }
            Value::Error(e) => format!("{}: {}", e.kind, e.message),
            Value::Outcome(_) | Value::Object(_) => "[object Object]".to_string(),
            Value::Promise(_) => "[object Promise]".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Outcome(a), Value::Outcome(b)) => a == b,
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(items) => write!(f, "{:?}", items),
            Value::Error(e) => write!(f, "{}: {}", e.kind, e.message),
            Value::Outcome(outcome) => write!(f, "{:?}", outcome),
            Value::Promise(p) => write!(f, "{:?}", p),
            Value::Object(_) => write!(f, "[Thenable]"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                // Integral numbers render without a trailing `.0`
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Error(e) => e.serialize(serializer),
            Value::Outcome(outcome) => outcome.serialize(serializer),
            Value::Promise(p) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("promise", &p.id())?;
                map.serialize_entry("state", &p.state())?;
                map.end()
            }
            Value::Object(_) => serializer.serialize_str("[object Object]"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Value::Promise(p)
    }
}

impl From<SettledOutcome> for Value {
    fn from(outcome: SettledOutcome) -> Self {
        Value::Outcome(Box::new(outcome))
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(e)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}
