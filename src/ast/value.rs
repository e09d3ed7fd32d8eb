// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Runtime values of the script interpreter

use super::{FunctionDef, Interpreter, ScopeRef};
use crate::error::Result;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value as Json;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub type ArrayRef = Arc<RwLock<Vec<Value>>>;
pub type ObjectRef = Arc<RwLock<IndexMap<String, Value>>>;
pub type NativeFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value>;

/// Script function together with the scope it was defined in
pub struct Closure {
    pub def: Arc<FunctionDef>,
    pub env: ScopeRef,
}

impl Closure {
    pub fn name(&self) -> &str {
        self.def.name.as_deref().unwrap_or("anonymous")
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.name())
    }
}

/// Built-in function implemented in Rust
#[derive(Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.name)
    }
}

/// Rust object exposed to scripts
///
/// Property reads go through [`HostObject::get`]; method calls receive the
/// owning `Arc` so chaining methods can return the receiver.
pub trait HostObject: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn get(&self, _interp: &mut Interpreter, _key: &str) -> Result<Value> {
        Ok(Value::Undefined)
    }

    fn set(&self, key: &str, _value: Value) -> Result<()> {
        Err(crate::error::ScriptError::runtime(format!(
            "Cannot set property '{key}' of {}",
            self.type_name()
        )))
    }

    fn index(&self, _interp: &mut Interpreter, _index: usize) -> Result<Value> {
        Ok(Value::Undefined)
    }

    fn call_method(self: Arc<Self>, interp: &mut Interpreter, name: &str, args: Vec<Value>)
        -> Result<Value>;

    /// Elements visited by `for..of`
    fn iter_values(&self) -> Option<Vec<Value>> {
        None
    }

    fn to_json(&self) -> Json {
        Json::String(format!("[{}]", self.type_name()))
    }

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Arc<Closure>),
    Native(Native),
    Host(Arc<dyn HostObject>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Function(closure) => closure.fmt(f),
            Value::Native(native) => native.fmt(f),
            Value::Host(host) => write!(f, "Host({})", host.type_name()),
            other => write!(f, "{}", other.inspect()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    pub fn object(map: IndexMap<String, Value>) -> Self {
        Value::Object(Arc::new(RwLock::new(map)))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Value::Native(Native { name, func })
    }

    pub fn host(host: impl HostObject + 'static) -> Self {
        Value::Host(Arc::new(host))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Downcast a host value to its concrete Rust type
    pub fn as_host<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Host(host) => host.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Host(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else if let Some(hex) = trimmed.strip_prefix("0x") {
                    i64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN)
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => {
                let items = items.read();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// String conversion used by `+`, templates and `String(x)`
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => items
                .read()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_display() })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".into(),
            Value::Function(closure) => format!("function {}() {{ [code] }}", closure.name()),
            Value::Native(native) => format!("function {}() {{ [native code] }}", native.name),
            Value::Host(host) => format!("[object {}]", host.type_name()),
        }
    }

    /// Rendering used by `print` and `console.*`
    pub fn inspect(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Array(_) | Value::Object(_) | Value::Host(_) => self.to_json().to_string(),
            other => other.to_display(),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Native(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(items.read().iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.read()
                    .iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Host(host) => host.to_json(),
        }
    }

    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s.as_str()),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::Host(a), Value::Host(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }
}

/// Number formatting matching script semantics: integral values print without a fraction
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e18 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// JSON number, integral when the value is integral
pub fn number_to_json(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Json::Number).unwrap_or(Json::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::from("5").loose_eq(&Value::Number(5.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::from("5").strict_eq(&Value::Number(5.0)));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        let value = Value::from_json(&serde_json::json!({"rows": [1, 2.5, "x"], "ok": true}));
        assert_eq!(value.to_json(), serde_json::json!({"rows": [1, 2.5, "x"], "ok": true}));
        assert_eq!(value.to_display(), "[object Object]");
        assert_eq!(Value::array(vec![1.0.into(), Value::Null, "a".into()]).to_display(), "1,,a");
    }
}
