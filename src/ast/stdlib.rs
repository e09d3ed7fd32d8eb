// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Language built-ins: `Math`, `JSON`, conversions and primitive methods

use super::scope::ScopeRef;
use super::value::{format_number, ArrayRef, Value};
use super::Interpreter;
use crate::error::{Result, ScriptError};
use std::cmp::Ordering;
use std::sync::Arc;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn num(args: &[Value], index: usize) -> f64 {
    arg(args, index).to_number()
}

/// Longest string `repeat` and `padStart`/`padEnd` may build, in bytes
pub const MAX_STRING_LENGTH: usize = 1 << 28;

/// Whole count for `repeat`/pad widths; infinite, negative or oversized results are rejected
fn string_count(value: f64, unit_len: usize, method: &str) -> Result<usize> {
    let count = if value.is_nan() { 0.0 } else { value.trunc() };
    if !count.is_finite() || count < 0.0 {
        return Err(ScriptError::runtime(format!("Invalid count value for {method}: {}", format_number(value))));
    }
    if count * unit_len.max(1) as f64 > MAX_STRING_LENGTH as f64 {
        return Err(ScriptError::runtime(format!(
            "Invalid count value for {method}: {} exceeds the maximum string length",
            format_number(value)
        )));
    }
    Ok(count as usize)
}

fn math_unary(args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    Ok(Value::Number(f(num(args, 0))))
}

fn object(entries: Vec<(&str, Value)>) -> Value {
    Value::object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn math() -> Value {
    object(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("abs", Value::native("abs", |_, a| math_unary(&a, f64::abs))),
        ("floor", Value::native("floor", |_, a| math_unary(&a, f64::floor))),
        ("ceil", Value::native("ceil", |_, a| math_unary(&a, f64::ceil))),
        // rounds half up like the browser, not half away from zero
        ("round", Value::native("round", |_, a| math_unary(&a, |x| (x + 0.5).floor()))),
        ("trunc", Value::native("trunc", |_, a| math_unary(&a, f64::trunc))),
        ("sign", Value::native("sign", |_, a| {
            math_unary(&a, |x| if x == 0.0 || x.is_nan() { x } else { x.signum() })
        })),
        ("sqrt", Value::native("sqrt", |_, a| math_unary(&a, f64::sqrt))),
        ("cbrt", Value::native("cbrt", |_, a| math_unary(&a, f64::cbrt))),
        ("sin", Value::native("sin", |_, a| math_unary(&a, f64::sin))),
        ("cos", Value::native("cos", |_, a| math_unary(&a, f64::cos))),
        ("tan", Value::native("tan", |_, a| math_unary(&a, f64::tan))),
        ("asin", Value::native("asin", |_, a| math_unary(&a, f64::asin))),
        ("acos", Value::native("acos", |_, a| math_unary(&a, f64::acos))),
        ("atan", Value::native("atan", |_, a| math_unary(&a, f64::atan))),
        ("log", Value::native("log", |_, a| math_unary(&a, f64::ln))),
        ("exp", Value::native("exp", |_, a| math_unary(&a, f64::exp))),
        ("atan2", Value::native("atan2", |_, a| Ok(Value::Number(num(&a, 0).atan2(num(&a, 1)))))),
        ("pow", Value::native("pow", |_, a| Ok(Value::Number(num(&a, 0).powf(num(&a, 1)))))),
        ("hypot", Value::native("hypot", |_, a| {
            Ok(Value::Number(a.iter().map(|v| v.to_number().powi(2)).sum::<f64>().sqrt()))
        })),
        ("min", Value::native("min", |_, a| {
            Ok(Value::Number(a.iter().map(Value::to_number).fold(f64::INFINITY, nan_min)))
        })),
        ("max", Value::native("max", |_, a| {
            Ok(Value::Number(a.iter().map(Value::to_number).fold(f64::NEG_INFINITY, nan_max)))
        })),
    ])
}

fn nan_min(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.min(x) }
}

fn nan_max(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.max(x) }
}

fn json_stringify(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let value = arg(&args, 0);
    if matches!(value, Value::Undefined) {
        return Ok(Value::Undefined);
    }
    let json = value.to_json();
    let indent = arg(&args, 2);
    let text = if indent.truthy() {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| ScriptError::runtime(e.to_string()))?;
    Ok(Value::from(text))
}

fn json_parse(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let text = arg(&args, 0).to_display();
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| ScriptError::runtime(format!("JSON.parse: {e}")))?;
    Ok(Value::from_json(&json))
}

fn parse_float(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let text = arg(&args, 0).to_display();
    let text = text.trim_start();
    let end = text
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || *c == '.' || ((*c == '-' || *c == '+') && *i == 0) || *c == 'e'
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    // shrink until the prefix parses, e.g. "1.5e" -> "1.5"
    let parsed = (1..=end)
        .rev()
        .find_map(|len| text.get(..len).and_then(|s| s.parse::<f64>().ok()));
    Ok(Value::Number(parsed.unwrap_or(f64::NAN)))
}

fn parse_int(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let text = arg(&args, 0).to_display();
    let radix = match arg(&args, 1) {
        Value::Number(r) if (2.0..=36.0).contains(&r) => r as u32,
        _ => 10,
    };
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    let parsed = i64::from_str_radix(&digits, radix)
        .map(|v| if negative { -(v as f64) } else { v as f64 })
        .unwrap_or(f64::NAN);
    Ok(Value::Number(parsed))
}

fn object_keys(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(match arg(&args, 0) {
        Value::Object(map) => Value::array(map.read().keys().map(|k| Value::from(k.as_str())).collect()),
        Value::Array(items) => Value::array(
            (0..items.read().len()).map(|i| Value::from(i.to_string())).collect(),
        ),
        _ => Value::array(Vec::new()),
    })
}

fn object_values(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(match arg(&args, 0) {
        Value::Object(map) => Value::array(map.read().values().cloned().collect()),
        Value::Array(items) => Value::array(items.read().clone()),
        _ => Value::array(Vec::new()),
    })
}

fn object_entries(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(match arg(&args, 0) {
        Value::Object(map) => Value::array(
            map.read()
                .iter()
                .map(|(k, v)| Value::array(vec![Value::from(k.as_str()), v.clone()]))
                .collect(),
        ),
        _ => Value::array(Vec::new()),
    })
}

fn object_assign(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let target = arg(&args, 0);
    if let Value::Object(map) = &target {
        for source in args.iter().skip(1) {
            if let Value::Object(source) = source {
                if Arc::ptr_eq(map, source) {
                    continue;
                }
                let entries: Vec<_> = source.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                map.write().extend(entries);
            }
        }
    }
    Ok(target)
}

/// Install the language built-ins into a global scope
pub fn install(globals: &ScopeRef) {
    let mut scope = globals.write();
    scope.declare("Math", math(), true);
    scope.declare(
        "JSON",
        object(vec![
            ("stringify", Value::native("stringify", json_stringify)),
            ("parse", Value::native("parse", json_parse)),
        ]),
        true,
    );
    scope.declare(
        "Object",
        object(vec![
            ("keys", Value::native("keys", object_keys)),
            ("values", Value::native("values", object_values)),
            ("entries", Value::native("entries", object_entries)),
            ("assign", Value::native("assign", object_assign)),
        ]),
        true,
    );
    scope.declare(
        "Array",
        object(vec![
            ("isArray", Value::native("isArray", |_, a| {
                Ok(Value::Bool(matches!(arg(&a, 0), Value::Array(_))))
            })),
            ("from", Value::native("from", |interp, a| {
                Ok(Value::array(interp.iterate(&arg(&a, 0)).unwrap_or_default()))
            })),
        ]),
        true,
    );
    scope.declare("Number", Value::native("Number", |_, a| Ok(Value::Number(num(&a, 0)))), true);
    scope.declare("String", Value::native("String", |_, a| Ok(Value::from(arg(&a, 0).to_display()))), true);
    scope.declare("Boolean", Value::native("Boolean", |_, a| Ok(Value::Bool(arg(&a, 0).truthy()))), true);
    scope.declare("isNaN", Value::native("isNaN", |_, a| Ok(Value::Bool(num(&a, 0).is_nan()))), true);
    scope.declare("parseFloat", Value::native("parseFloat", parse_float), true);
    scope.declare("parseInt", Value::native("parseInt", parse_int), true);
    scope.declare("NaN", Value::Number(f64::NAN), true);
    scope.declare("Infinity", Value::Number(f64::INFINITY), true);
}

/// Relative index as used by `slice`: negatives count from the end
fn clamp_index(value: Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let len_f = len as f64;
    let resolved = if n < 0.0 { (len_f + n).max(0.0) } else { n.min(len_f) };
    resolved.trunc() as usize
}

fn compare_default(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => a.to_display().cmp(&b.to_display()),
    }
}

/// Array methods; `None` when the method does not exist
pub fn array_method(
    interp: &mut Interpreter,
    items: &ArrayRef,
    name: &str,
    args: Vec<Value>,
) -> Option<Result<Value>> {
    let this = Value::Array(items.clone());
    let callback = arg(&args, 0);
    let result = match name {
        "push" => {
            let mut guard = items.write();
            guard.extend(args);
            Ok(Value::Number(guard.len() as f64))
        }
        "pop" => Ok(items.write().pop().unwrap_or_default()),
        "shift" => {
            let mut guard = items.write();
            Ok(if guard.is_empty() { Value::Undefined } else { guard.remove(0) })
        }
        "unshift" => {
            let mut guard = items.write();
            for (i, value) in args.into_iter().enumerate() {
                guard.insert(i, value);
            }
            Ok(Value::Number(guard.len() as f64))
        }
        "includes" => {
            let needle = arg(&args, 0);
            Ok(Value::Bool(items.read().iter().any(|v| v.strict_eq(&needle))))
        }
        "indexOf" => {
            let needle = arg(&args, 0);
            let index = items.read().iter().position(|v| v.strict_eq(&needle));
            Ok(Value::Number(index.map(|i| i as f64).unwrap_or(-1.0)))
        }
        "join" => {
            let separator = match arg(&args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_display(),
            };
            let joined = items
                .read()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_display() })
                .collect::<Vec<_>>()
                .join(&separator);
            Ok(Value::from(joined))
        }
        "slice" => {
            let snapshot = items.read().clone();
            let start = clamp_index(arg(&args, 0), snapshot.len(), 0);
            let end = clamp_index(arg(&args, 1), snapshot.len(), snapshot.len());
            Ok(Value::array(snapshot.get(start..end.max(start)).unwrap_or_default().to_vec()))
        }
        "concat" => {
            let mut out = items.read().clone();
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.read().iter().cloned()),
                    other => out.push(other),
                }
            }
            Ok(Value::array(out))
        }
        "reverse" => {
            items.write().reverse();
            Ok(this)
        }
        "sort" => {
            let mut snapshot = items.read().clone();
            if callback.is_callable() {
                let mut failure = None;
                snapshot.sort_by(|a, b| {
                    if failure.is_some() {
                        return Ordering::Equal;
                    }
                    match interp.call(&callback, vec![a.clone(), b.clone()]) {
                        Ok(v) => v.to_number().partial_cmp(&0.0).unwrap_or(Ordering::Equal),
                        Err(err) => {
                            failure = Some(err);
                            Ordering::Equal
                        }
                    }
                });
                if let Some(err) = failure {
                    return Some(Err(err));
                }
            } else {
                snapshot.sort_by(compare_default);
            }
            *items.write() = snapshot;
            Ok(this)
        }
        "forEach" | "map" | "filter" | "find" | "findIndex" | "some" | "every" => {
            iterate_with(interp, items, &this, name, &callback)
        }
        "reduce" => {
            let snapshot = items.read().clone();
            let mut iter = snapshot.into_iter().enumerate();
            let mut acc = if args.len() > 1 {
                arg(&args, 1)
            } else {
                match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Some(Err(ScriptError::runtime(
                            "Reduce of empty array with no initial value",
                        )))
                    }
                }
            };
            for (i, item) in iter {
                acc = match interp.call(&callback, vec![acc, item, Value::Number(i as f64), this.clone()]) {
                    Ok(v) => v,
                    Err(err) => return Some(Err(err)),
                };
            }
            Ok(acc)
        }
        _ => return None,
    };
    Some(result)
}

fn iterate_with(
    interp: &mut Interpreter,
    items: &ArrayRef,
    this: &Value,
    name: &str,
    callback: &Value,
) -> Result<Value> {
    if !callback.is_callable() {
        return Err(ScriptError::runtime(format!(
            "{} is not a function",
            callback.to_display()
        )));
    }
    let snapshot = items.read().clone();
    let mut mapped = Vec::new();
    for (i, item) in snapshot.into_iter().enumerate() {
        let result = interp.call(callback, vec![item.clone(), Value::Number(i as f64), this.clone()])?;
        match name {
            "map" => mapped.push(result),
            "filter" if result.truthy() => mapped.push(item),
            "find" if result.truthy() => return Ok(item),
            "findIndex" if result.truthy() => return Ok(Value::Number(i as f64)),
            "some" if result.truthy() => return Ok(Value::Bool(true)),
            "every" if !result.truthy() => return Ok(Value::Bool(false)),
            _ => {}
        }
    }
    Ok(match name {
        "map" | "filter" => Value::array(mapped),
        "findIndex" => Value::Number(-1.0),
        "some" => Value::Bool(false),
        "every" => Value::Bool(true),
        _ => Value::Undefined,
    })
}

/// String methods; `None` when the method does not exist
pub fn string_method(s: &Arc<str>, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let text = arg(args, 0).to_display();
    let chars: Vec<char> = s.chars().collect();
    let value = match name {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "includes" => Value::Bool(s.contains(text.as_str())),
        "startsWith" => Value::Bool(s.starts_with(text.as_str())),
        "endsWith" => Value::Bool(s.ends_with(text.as_str())),
        "indexOf" => Value::Number(
            s.find(text.as_str())
                .map(|byte| s[..byte].chars().count() as f64)
                .unwrap_or(-1.0),
        ),
        "split" => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::Str(s.clone())],
                _ if text.is_empty() => chars.iter().map(|c| Value::from(c.to_string())).collect(),
                _ => s.split(text.as_str()).map(Value::from).collect(),
            };
            Value::array(parts)
        }
        "slice" | "substring" => {
            let start = clamp_index(arg(args, 0), chars.len(), 0);
            let end = clamp_index(arg(args, 1), chars.len(), chars.len());
            let (start, end) = if name == "substring" && start > end { (end, start) } else { (start, end.max(start)) };
            Value::from(chars[start..end].iter().collect::<String>())
        }
        "charAt" => {
            let index = num(args, 0);
            let index = if index.is_nan() { 0 } else { index as usize };
            Value::from(chars.get(index).map(|c| c.to_string()).unwrap_or_default())
        }
        "replace" => Value::from(s.replacen(text.as_str(), &arg(args, 1).to_display(), 1)),
        "replaceAll" => Value::from(s.replace(text.as_str(), &arg(args, 1).to_display())),
        "repeat" => match string_count(num(args, 0), s.len(), name) {
            Ok(count) => Value::from(s.repeat(count)),
            Err(err) => return Some(Err(err)),
        },
        "padStart" | "padEnd" => {
            let width = match string_count(num(args, 0).max(0.0), 1, name) {
                Ok(width) => width,
                Err(err) => return Some(Err(err)),
            };
            let fill = match arg(args, 1) {
                Value::Undefined => " ".to_string(),
                other => other.to_display(),
            };
            if chars.len() >= width || fill.is_empty() {
                Value::Str(s.clone())
            } else {
                let padding: String = fill.chars().cycle().take(width - chars.len()).collect();
                if name == "padStart" {
                    Value::from(format!("{padding}{s}"))
                } else {
                    Value::from(format!("{s}{padding}"))
                }
            }
        }
        "toString" => Value::Str(s.clone()),
        _ => return None,
    };
    Some(Ok(value))
}

/// Number methods; `None` when the method does not exist
pub fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let value = match name {
        "toFixed" => {
            let digits = num(args, 0);
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Value::from(format!("{n:.digits$}"))
        }
        "toString" => Value::from(format_number(n)),
        _ => return None,
    };
    Some(Ok(value))
}
