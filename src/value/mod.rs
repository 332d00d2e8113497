//! Provides a dynamic value type abstraction.
//!
//! This module gives access to the dynamically typed value which the
//! template engine uses during evaluation and rendering.  Host data is
//! converted into values via [`serde`] ([`Value::from_serializable`]) or
//! the various [`From`] impls, and registered functions receive and
//! return values.
//!
//! # Basic Value Conversions
//!
//! Values are typically created via the [`From`] trait:
//!
//! ```
//! # use miniblade::value::Value;
//! let int_value = Value::from(42);
//! let none_value = Value::from(());
//! let true_value = Value::from(true);
//! ```
//!
//! Or via the [`FromIterator`] trait:
//!
//! ```
//! # use miniblade::value::Value;
//! // collection into a sequence
//! let value: Value = (1..10).collect();
//!
//! // collection into a map
//! let value: Value = [("key", "value")].into_iter().collect();
//! ```
//!
//! # HTML Escaping
//!
//! Escaped interpolation (`{{ }}`) will HTML escape rendered values.  To
//! prevent this for trusted markup a value can be created with
//! [`Value::from_safe_string`]; slot and custom directive output uses the
//! same mechanism internally.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorKind};

pub(crate) mod ops;
mod serialize;

pub use self::serialize::ValueMap;

/// The type of a string value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StringType {
    Normal,
    /// Pre-escaped trusted markup, exempt from HTML escaping.
    Safe,
}

/// Signature of native functions callable from expressions.
pub type FuncFn = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

pub(crate) struct FuncObject {
    pub name: Cow<'static, str>,
    pub f: Box<FuncFn>,
}

impl fmt::Debug for FuncObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

#[derive(Clone)]
pub(crate) enum ValueRepr {
    Undefined,
    None,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(Arc<str>, StringType),
    Seq(Arc<Vec<Value>>),
    Map(Arc<ValueMap>),
    Func(Arc<FuncObject>),
}

/// Describes the kind of a [`Value`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueKind {
    /// The absent sentinel for missing names.
    Undefined,
    /// The none/null value.
    None,
    /// A boolean.
    Bool,
    /// A number (integer or float).
    Number,
    /// A string.
    String,
    /// A sequence (list, tuple or set literal).
    Seq,
    /// A mapping.
    Map,
    /// A callable function.
    Func,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Undefined => "undefined",
            ValueKind::None => "none",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Seq => "sequence",
            ValueKind::Map => "map",
            ValueKind::Func => "function",
        };
        write!(f, "{name}")
    }
}

/// Represents a dynamically typed value in the template engine.
#[derive(Clone)]
pub struct Value(pub(crate) ValueRepr);

impl Value {
    /// The absent sentinel.
    ///
    /// Missing context names resolve to this value outside of strict mode.
    /// It is falsy, renders to the empty string and yields
    /// [`UNDEFINED`](Self::UNDEFINED) again for any attribute access.
    pub const UNDEFINED: Value = Value(ValueRepr::Undefined);

    /// Creates a value from something that can be serialized.
    ///
    /// During serialization the value is inspected and converted into the
    /// engine's internal representation.  Serialization errors surface as
    /// [`ErrorKind::BadSerialization`] when the value is later used.
    pub fn from_serializable<T: serde::Serialize>(value: &T) -> Value {
        serialize::to_value(value)
    }

    /// Creates a value from a safe (pre-escaped) string.
    pub fn from_safe_string(value: String) -> Value {
        Value(ValueRepr::String(value.into(), StringType::Safe))
    }

    /// Creates a callable value from a native function.
    pub fn from_function<F>(name: impl Into<Cow<'static, str>>, f: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Value(ValueRepr::Func(Arc::new(FuncObject {
            name: name.into(),
            f: Box::new(f),
        })))
    }

    /// Returns the kind of the value.
    pub fn kind(&self) -> ValueKind {
        match self.0 {
            ValueRepr::Undefined => ValueKind::Undefined,
            ValueRepr::None => ValueKind::None,
            ValueRepr::Bool(_) => ValueKind::Bool,
            ValueRepr::I64(_) | ValueRepr::F64(_) => ValueKind::Number,
            ValueRepr::String(..) => ValueKind::String,
            ValueRepr::Seq(_) => ValueKind::Seq,
            ValueRepr::Map(_) => ValueKind::Map,
            ValueRepr::Func(_) => ValueKind::Func,
        }
    }

    /// Returns `true` if the value is the absent sentinel.
    pub fn is_undefined(&self) -> bool {
        matches!(self.0, ValueRepr::Undefined)
    }

    /// Returns `true` if the value is none.
    pub fn is_none(&self) -> bool {
        matches!(self.0, ValueRepr::None)
    }

    /// Returns `true` if the value is a safe (pre-escaped) string.
    pub fn is_safe(&self) -> bool {
        matches!(self.0, ValueRepr::String(_, StringType::Safe))
    }

    /// Returns the truthiness of the value.
    pub fn is_true(&self) -> bool {
        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => false,
            ValueRepr::Bool(b) => b,
            ValueRepr::I64(i) => i != 0,
            ValueRepr::F64(f) => f != 0.0,
            ValueRepr::String(ref s, _) => !s.is_empty(),
            ValueRepr::Seq(ref seq) => !seq.is_empty(),
            ValueRepr::Map(ref map) => !map.is_empty(),
            ValueRepr::Func(_) => true,
        }
    }

    /// If the value is a string, returns it.
    pub fn as_str(&self) -> Option<&str> {
        match self.0 {
            ValueRepr::String(ref s, _) => Some(s),
            _ => None,
        }
    }

    /// If the value is a sequence, returns a slice of its items.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self.0 {
            ValueRepr::Seq(ref seq) => Some(seq),
            _ => None,
        }
    }

    /// If the value is a map, returns it.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self.0 {
            ValueRepr::Map(ref map) => Some(map),
            _ => None,
        }
    }

    /// If the value is a boolean, returns it.
    pub fn as_bool(&self) -> Option<bool> {
        match self.0 {
            ValueRepr::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// If the value is an integer, returns it.
    pub fn as_i64(&self) -> Option<i64> {
        match self.0 {
            ValueRepr::I64(i) => Some(i),
            ValueRepr::Bool(b) => Some(b as i64),
            _ => None,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self.0 {
            ValueRepr::I64(i) => Some(i as f64),
            ValueRepr::F64(f) => Some(f),
            ValueRepr::Bool(b) => Some(b as i64 as f64),
            _ => None,
        }
    }

    /// Returns the length of the contained collection or string.
    pub fn len(&self) -> Option<usize> {
        match self.0 {
            ValueRepr::String(ref s, _) => Some(s.chars().count()),
            ValueRepr::Seq(ref seq) => Some(seq.len()),
            ValueRepr::Map(ref map) => Some(map.len()),
            _ => None,
        }
    }

    /// Returns `true` if the collection is empty.
    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|l| l == 0)
    }

    /// Looks up an attribute by name.
    ///
    /// Attribute access on mapping values falls back to index access so
    /// that `x.y` and `x["y"]` are equivalent for maps.  Accessing an
    /// attribute of the absent sentinel yields the sentinel again.
    pub fn get_attr(&self, name: &str) -> Value {
        match self.0 {
            ValueRepr::Map(ref map) => map.get(name).cloned().unwrap_or(Value::UNDEFINED),
            _ => Value::UNDEFINED,
        }
    }

    /// Looks up an item by index value.
    pub fn get_item(&self, index: &Value) -> Value {
        match self.0 {
            ValueRepr::Map(ref map) => match index.as_str() {
                Some(key) => map.get(key).cloned().unwrap_or(Value::UNDEFINED),
                None => Value::UNDEFINED,
            },
            ValueRepr::Seq(ref seq) => {
                let idx = match index.as_i64() {
                    Some(idx) => idx,
                    None => return Value::UNDEFINED,
                };
                let idx = if idx < 0 {
                    match (seq.len() as i64).checked_add(idx) {
                        Some(idx) if idx >= 0 => idx as usize,
                        _ => return Value::UNDEFINED,
                    }
                } else {
                    idx as usize
                };
                seq.get(idx).cloned().unwrap_or(Value::UNDEFINED)
            }
            ValueRepr::String(ref s, _) => {
                let idx = match index.as_i64() {
                    Some(idx) if idx >= 0 => idx as usize,
                    _ => return Value::UNDEFINED,
                };
                s.chars()
                    .nth(idx)
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or(Value::UNDEFINED)
            }
            _ => Value::UNDEFINED,
        }
    }

    /// Calls the value if it is callable.
    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        match self.0 {
            ValueRepr::Func(ref func) => (func.f)(args),
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("value of type {} is not callable", self.kind()),
            )),
        }
    }

    /// Iterates over the value.
    ///
    /// Sequences yield their items, maps their keys, and strings their
    /// characters.  Everything else is an error.
    pub fn try_iter(&self) -> Result<Vec<Value>, Error> {
        match self.0 {
            ValueRepr::Seq(ref seq) => Ok(seq.as_ref().clone()),
            ValueRepr::Map(ref map) => {
                Ok(map.keys().map(|k| Value::from(k.as_str())).collect())
            }
            ValueRepr::String(ref s, _) => {
                Ok(s.chars().map(|c| Value::from(c.to_string())).collect())
            }
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("value of type {} is not iterable", self.kind()),
            )),
        }
    }

    /// Like [`try_iter`](Self::try_iter) but maps iterate as `(key, value)`
    /// pairs, for paired loop bindings.
    pub(crate) fn try_iter_pairs(&self) -> Result<Vec<Value>, Error> {
        match self.0 {
            ValueRepr::Map(ref map) => Ok(map
                .iter()
                .map(|(k, v)| Value::from(vec![Value::from(k.as_str()), v.clone()]))
                .collect()),
            _ => self.try_iter(),
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        Value(ValueRepr::None)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ValueRepr::Undefined => write!(f, "undefined"),
            ValueRepr::None => write!(f, "none"),
            ValueRepr::Bool(b) => write!(f, "{b:?}"),
            ValueRepr::I64(i) => write!(f, "{i:?}"),
            ValueRepr::F64(v) => write!(f, "{v:?}"),
            ValueRepr::String(ref s, _) => write!(f, "{s:?}"),
            ValueRepr::Seq(ref seq) => f.debug_list().entries(seq.iter()).finish(),
            ValueRepr::Map(ref map) => f.debug_map().entries(map.iter()).finish(),
            ValueRepr::Func(ref func) => fmt::Debug::fmt(func, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            // undefined and none render to nothing
            ValueRepr::Undefined | ValueRepr::None => Ok(()),
            ValueRepr::Bool(b) => write!(f, "{b}"),
            ValueRepr::I64(i) => write!(f, "{i}"),
            ValueRepr::F64(v) => {
                if v == v.floor() && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            ValueRepr::String(ref s, _) => write!(f, "{s}"),
            ValueRepr::Seq(_) | ValueRepr::Map(_) => fmt::Debug::fmt(self, f),
            ValueRepr::Func(ref func) => write!(f, "<function {}>", func.name),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        ops::value_eq(self, other)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value(ValueRepr::None)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value(ValueRepr::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value(ValueRepr::I64(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value(ValueRepr::I64(value as i64))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value(ValueRepr::I64(value as i64))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value(ValueRepr::F64(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value(ValueRepr::String(value.into(), StringType::Normal))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value(ValueRepr::String(value.into(), StringType::Normal))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value(ValueRepr::String(value, StringType::Normal))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value(ValueRepr::Seq(Arc::new(
            value.into_iter().map(Into::into).collect(),
        )))
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value(ValueRepr::Map(Arc::new(value)))
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value(ValueRepr::Seq(Arc::new(
            iter.into_iter().map(Into::into).collect(),
        )))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value(ValueRepr::Map(Arc::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect::<BTreeMap<_, _>>(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::UNDEFINED.is_true());
        assert!(!Value::from(()).is_true());
        assert!(!Value::from(0).is_true());
        assert!(!Value::from("").is_true());
        assert!(Value::from(1).is_true());
        assert!(Value::from("x").is_true());
        assert!(!Value::from(Vec::<i32>::new()).is_true());
    }

    #[test]
    fn test_get_item_negative_index() {
        let seq = Value::from(vec![1, 2, 3]);
        assert_eq!(seq.get_item(&Value::from(-1)), Value::from(3));
        assert_eq!(seq.get_item(&Value::from(-4)), Value::UNDEFINED);
    }

    #[test]
    fn test_attr_index_equivalence() {
        let map: Value = [("y", 42)].into_iter().collect();
        assert_eq!(map.get_attr("y"), Value::from(42));
        assert_eq!(map.get_item(&Value::from("y")), Value::from(42));
    }
}
