//! Dynamic Values
//!
//! Scope properties and watch results are untyped. This module provides the
//! `Value` type that carries them.
//!
//! # Sharing
//!
//! Primitives (`Undefined`, `Null`, `Bool`, `Number`, `String`) are plain
//! values. Containers (`Array`, `Object`) are shared handles: cloning a
//! `Value::Array` clones the handle, not the elements, so every clone sees
//! in-place mutation made through any other clone.
//!
//! This is what gives the two equality modes their meaning:
//!
//! - reference mode compares containers by identity, so pushing onto a
//!   watched array is *not* a change;
//! - deep mode compares containers structurally, so the same push *is* a
//!   change, and the digest stores a [`Value::deep_clone`] so later
//!   mutation of the live array cannot leak into the recorded value.
//!
//! # Cycles
//!
//! Containers may reference themselves. [`deep_eq`] and
//! [`Value::deep_clone`] handle cycles; `Debug` and [`Value::to_json`] do not.

mod equality;

pub use equality::{deep_eq, same_value, values_equal, EqualityMode};

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// An untyped value held by a scope or produced by a watch function.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value. Reading a missing property yields this.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Array),
    Object(Object),
}

impl Value {
    /// Create an array value from anything convertible to values.
    pub fn array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Array(Array::from_vec(items.into_iter().map(Into::into).collect()))
    }

    /// Create an empty object value.
    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    /// Create an object value from key/value pairs, keeping their order.
    pub fn object_from<I, K, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        let object = Object::new();
        for (key, value) in pairs {
            object.insert(key, value);
        }
        Value::Object(object)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
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

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Truthiness: `Undefined`, `Null`, `false`, `0`, `NaN` and `""` are
    /// falsy, everything else (including empty containers) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Copy this value so that the result shares no container with `self`.
    ///
    /// Cyclic structures keep their shape: a container reachable twice in
    /// the source is cloned once and referenced twice in the copy.
    pub fn deep_clone(&self) -> Value {
        DeepClone::default().clone_value(self)
    }

    /// Convert to JSON. `Undefined` and non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(a) => {
                serde_json::Value::Array(a.borrow().iter().map(Value::to_json).collect())
            }
            Value::Object(o) => serde_json::Value::Object(
                o.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Structural equality, i.e. [`deep_eq`]. Use [`same_value`] for identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_eq(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(a) => fmt::Debug::fmt(a, f),
            Value::Object(o) => fmt::Debug::fmt(o, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::array(items),
            serde_json::Value::Object(map) => Value::object_from(map),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_int!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from_vec(items))
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Undefined, Into::into)
    }
}

// ----------------------------------------------------------------------------
// Containers
// ----------------------------------------------------------------------------

/// A shared, growable list of values.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Element at `index`, or `Undefined` when out of range.
    pub fn get(&self, index: usize) -> Value {
        self.0.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Store `value` at `index`, padding with `Undefined` when past the end.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value.into();
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn pop(&self) -> Option<Value> {
        self.0.borrow_mut().pop()
    }

    /// Membership under reference-mode equality (so `NaN` is found).
    pub fn contains(&self, value: &Value) -> bool {
        self.0.borrow().iter().any(|item| same_value(item, value))
    }

    /// Snapshot of the elements. Containers inside remain shared.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Whether both handles point at the same storage.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

/// A shared map of string keys to values. Keys keep insertion order.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<IndexMap<String, Value>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Value stored under `key`, or `Undefined` when missing.
    pub fn get(&self, key: &str) -> Value {
        self.0.borrow().get(key).cloned().unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Insert or overwrite, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Whether both handles point at the same storage.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn borrow(&self) -> Ref<'_, IndexMap<String, Value>> {
        self.0.borrow()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(map) => f.debug_map().entries(map.iter()).finish(),
            Err(_) => f.write_str("{<borrowed>}"),
        }
    }
}

/// Deep copy with a table of already-cloned containers, keyed by address.
#[derive(Default)]
struct DeepClone {
    seen: HashMap<usize, Value>,
}

impl DeepClone {
    fn clone_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Array(source) => {
                if let Some(copy) = self.seen.get(&source.addr()) {
                    return copy.clone();
                }
                let copy = Array::new();
                self.seen.insert(source.addr(), Value::Array(copy.clone()));
                for item in source.to_vec() {
                    let item = self.clone_value(&item);
                    copy.push(item);
                }
                Value::Array(copy)
            }
            Value::Object(source) => {
                if let Some(copy) = self.seen.get(&source.addr()) {
                    return copy.clone();
                }
                let copy = Object::new();
                self.seen.insert(source.addr(), Value::Object(copy.clone()));
                let entries: Vec<(String, Value)> = source
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (key, item) in entries {
                    let item = self.clone_value(&item);
                    copy.insert(key, item);
                }
                Value::Object(copy)
            }
            primitive => primitive.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_clones_share_storage() {
        let a = Value::array([1, 2, 3]);
        let b = a.clone();

        b.as_array().unwrap().push(4);

        assert_eq!(a.as_array().unwrap().len(), 4);
        assert!(same_value(&a, &b));
    }

    #[test]
    fn deep_clone_detaches_containers() {
        let inner = Value::array([1]);
        let outer = Value::object_from([("inner", inner.clone())]);

        let copy = outer.deep_clone();
        inner.as_array().unwrap().push(2);

        assert_eq!(copy.as_object().unwrap().get("inner"), Value::array([1]));
        assert!(!same_value(&outer, &copy));
    }

    #[test]
    fn deep_clone_preserves_cycles() {
        let array = Array::new();
        array.push(1);
        array.push(Value::Array(array.clone()));

        let copy = Value::Array(array.clone()).deep_clone();
        let copy = copy.as_array().unwrap();

        assert!(!copy.ptr_eq(&array));
        let nested = copy.get(1);
        assert!(nested.as_array().unwrap().ptr_eq(copy));
    }

    #[test]
    fn missing_entries_read_as_undefined() {
        let array = Array::new();
        assert!(array.get(3).is_undefined());

        let object = Object::new();
        assert!(object.get("nope").is_undefined());
    }

    #[test]
    fn array_set_pads_with_undefined() {
        let array = Array::new();
        array.set(2, "x");

        assert_eq!(array.len(), 3);
        assert!(array.get(0).is_undefined());
        assert_eq!(array.get(2).as_str(), Some("x"));
    }

    #[test]
    fn null_is_distinct_from_undefined() {
        assert!(Value::Null.is_null());
        assert!(!Value::Undefined.is_null());
        assert!(Value::from(serde_json::Value::Null).is_null());
    }

    #[test]
    fn empty_object_fills_in_place() {
        let value = Value::object();
        let object = value.as_object().unwrap();
        assert!(object.is_empty());

        object.insert("k", 1);
        assert_eq!(value, Value::object_from([("k", 1)]));
    }

    #[test]
    fn pop_takes_the_last_item() {
        let value = Value::array([1, 2]);
        let array = value.as_array().unwrap();

        assert_eq!(array.pop(), Some(Value::from(2)));
        assert_eq!(array.pop(), Some(Value::from(1)));
        assert_eq!(array.pop(), None);
        assert!(array.is_empty());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("a").is_truthy());
        assert!(Value::array(Vec::<Value>::new()).is_truthy());
    }

    #[test]
    fn json_conversion() {
        let json = serde_json::json!({ "name": "Jane", "tags": [1, 2.5, null], "ok": true });
        let value = Value::from(json.clone());

        assert_eq!(value.as_object().unwrap().get("name").as_str(), Some("Jane"));
        assert_eq!(value.to_json(), json);
        assert_eq!(Value::Undefined.to_json(), serde_json::Value::Null);
        assert_eq!(Value::from(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn serializes_through_json_mapping() {
        let value = Value::object_from([("n", Value::from(3)), ("s", Value::from("x"))]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"n":3,"s":"x"}"#);
    }
}
