//! Equality Engine
//!
//! Decides whether a freshly observed value differs from the one a watcher
//! recorded last time. Each watcher picks one of two modes at registration.

use serde::{Deserialize, Serialize};

use super::Value;

/// How a watcher compares successive values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualityMode {
    /// Identity for containers, value for primitives, `NaN == NaN`.
    #[default]
    Reference,

    /// Recursive structural comparison.
    Deep,
}

/// Compare two values under the given mode.
pub fn values_equal(a: &Value, b: &Value, mode: EqualityMode) -> bool {
    match mode {
        EqualityMode::Reference => same_value(a, b),
        EqualityMode::Deep => deep_eq(a, b),
    }
}

/// Reference-mode equality.
///
/// Primitives compare by value (strings by content). Arrays and objects are
/// equal only when they are the same container. `NaN` equals `NaN`, otherwise
/// a watch on a `NaN` would never settle.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(*x, *y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => x.ptr_eq(y),
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Deep-mode equality.
///
/// Same shape, same keys, same nested values. Object key order does not
/// matter. Comparing self-referencing structures terminates: a pair of
/// containers already under comparison further up is treated as equal.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    DeepEq::default().eq(a, b)
}

fn numbers_equal(x: f64, y: f64) -> bool {
    x == y || (x.is_nan() && y.is_nan())
}

#[derive(Default)]
struct DeepEq {
    /// Container address pairs currently on the comparison stack.
    in_progress: Vec<(usize, usize)>,
}

impl DeepEq {
    fn eq(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Array(x), Value::Array(y)) => {
                if x.ptr_eq(y) {
                    return true;
                }
                let pair = (x.addr(), y.addr());
                if self.in_progress.contains(&pair) {
                    return true;
                }

                let (xs, ys) = (x.borrow(), y.borrow());
                if xs.len() != ys.len() {
                    return false;
                }

                self.in_progress.push(pair);
                let equal = xs.iter().zip(ys.iter()).all(|(l, r)| self.eq(l, r));
                self.in_progress.pop();
                equal
            }
            (Value::Object(x), Value::Object(y)) => {
                if x.ptr_eq(y) {
                    return true;
                }
                let pair = (x.addr(), y.addr());
                if self.in_progress.contains(&pair) {
                    return true;
                }

                let (xs, ys) = (x.borrow(), y.borrow());
                if xs.len() != ys.len() {
                    return false;
                }

                self.in_progress.push(pair);
                let equal = xs
                    .iter()
                    .all(|(key, l)| ys.get(key).is_some_and(|r| self.eq(l, r)));
                self.in_progress.pop();
                equal
            }
            _ => same_value(a, b),
        }
    }
}
