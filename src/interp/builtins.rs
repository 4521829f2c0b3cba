//! Builtins
//!
//! The global function map and the method maps available to interpreted
//! function bodies. Calls are checked against each entry's declared
//! argument count before they run.
//!
//! Globals and string methods work on JSON copies of their arguments.
//! Array methods work on the shared array itself, so `push` is seen
//! through every alias and `indexOf` can find an array by identity.

use log::info;
use phf::phf_map;
use serde_json::Value;
use std::fmt;

use crate::error::Error;
use crate::interp::value::{self, ArrayNode, Heap, JsValue};
use crate::js_op;

/// How many arguments a builtin or method accepts
#[derive(Debug, Clone)]
pub enum NumParams {
    None,
    Any,
    Unary,
    Exactly(usize),
    AtLeast(usize),
    /// Half-open, like the range itself
    Variadic(std::ops::Range<usize>),
}

impl NumParams {
    fn accepts(&self, count: usize) -> bool {
        match self {
            NumParams::Any => true,
            NumParams::None => count == 0,
            NumParams::Unary => count == 1,
            NumParams::Exactly(exact) => count == *exact,
            NumParams::AtLeast(min) => count >= *min,
            NumParams::Variadic(range) => range.contains(&count),
        }
    }

    fn check<T>(&self, args: &[T]) -> Result<(), Error> {
        if self.accepts(args.len()) {
            return Ok(());
        }
        Err(Error::WrongArgumentCount {
            expected: self.clone(),
            actual: args.len(),
        })
    }
}

type BuiltinFn = fn(&[&Value]) -> Result<Value, Error>;
type MethodFn = fn(&Value, &[&Value]) -> Result<Value, Error>;
type ArrayMethodFn = fn(&mut Heap, &ArrayNode, &[JsValue]) -> Result<JsValue, Error>;

/// A global function such as `Math.max` or `String`
pub struct Builtin {
    symbol: &'static str,
    operator: BuiltinFn,
    num_params: NumParams,
}
impl Builtin {
    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        self.num_params.check(args)?;
        let refs: Vec<&Value> = args.iter().collect();
        (self.operator)(&refs)
    }
}
impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("symbol", &self.symbol)
            .field("operator", &"<builtin fn>")
            .finish()
    }
}

/// A method called on a JSON receiver
pub struct Method {
    symbol: &'static str,
    operator: MethodFn,
    num_params: NumParams,
}
impl Method {
    pub fn call(&self, receiver: &Value, args: &[Value]) -> Result<Value, Error> {
        self.num_params.check(args)?;
        let refs: Vec<&Value> = args.iter().collect();
        (self.operator)(receiver, &refs)
    }
}
impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("symbol", &self.symbol)
            .field("operator", &"<method fn>")
            .finish()
    }
}

/// A method called on a shared array
pub struct ArrayMethod {
    symbol: &'static str,
    operator: ArrayMethodFn,
    num_params: NumParams,
}
impl ArrayMethod {
    pub fn call(&self, heap: &mut Heap, array: &ArrayNode, args: &[JsValue]) -> Result<JsValue, Error> {
        self.num_params.check(args)?;
        (self.operator)(heap, array, args)
    }
}
impl fmt::Debug for ArrayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayMethod")
            .field("symbol", &self.symbol)
            .field("operator", &"<array method fn>")
            .finish()
    }
}

pub const BUILTIN_MAP: phf::Map<&'static str, Builtin> = phf_map! {
    "Math.max" => Builtin {
        symbol: "Math.max",
        operator: |items| js_op::abstract_max(items)
            .and_then(|num| js_op::to_number_value(num, "Math.max")),
        num_params: NumParams::AtLeast(1),
    },
    "Math.min" => Builtin {
        symbol: "Math.min",
        operator: |items| js_op::abstract_min(items)
            .and_then(|num| js_op::to_number_value(num, "Math.min")),
        num_params: NumParams::AtLeast(1),
    },
    "Math.abs" => Builtin {
        symbol: "Math.abs",
        operator: |items| math(items[0], "Math.abs", f64::abs),
        num_params: NumParams::Unary,
    },
    "Math.floor" => Builtin {
        symbol: "Math.floor",
        operator: |items| math(items[0], "Math.floor", f64::floor),
        num_params: NumParams::Unary,
    },
    "Math.ceil" => Builtin {
        symbol: "Math.ceil",
        operator: |items| math(items[0], "Math.ceil", f64::ceil),
        num_params: NumParams::Unary,
    },
    // JS rounds halves towards positive infinity
    "Math.round" => Builtin {
        symbol: "Math.round",
        operator: |items| math(items[0], "Math.round", |num| (num + 0.5).floor()),
        num_params: NumParams::Unary,
    },
    "Math.trunc" => Builtin {
        symbol: "Math.trunc",
        operator: |items| math(items[0], "Math.trunc", f64::trunc),
        num_params: NumParams::Unary,
    },
    "Math.sqrt" => Builtin {
        symbol: "Math.sqrt",
        operator: |items| math(items[0], "Math.sqrt", f64::sqrt),
        num_params: NumParams::Unary,
    },
    "Math.pow" => Builtin {
        symbol: "Math.pow",
        operator: |items| power(items[0], items[1]),
        num_params: NumParams::Exactly(2),
    },
    "String" => Builtin {
        symbol: "String",
        operator: |items| Ok(Value::String(
            items.first().map(|v| js_op::to_string(v)).unwrap_or_default()
        )),
        num_params: NumParams::Variadic(0..2),
    },
    "Number" => Builtin {
        symbol: "Number",
        operator: |items| match items.first() {
            Some(v) => number(v, "Number", js_op::to_number),
            None => Ok(Value::from(0)),
        },
        num_params: NumParams::Variadic(0..2),
    },
    "Boolean" => Builtin {
        symbol: "Boolean",
        operator: |items| Ok(Value::Bool(
            items.first().map(|v| js_op::truthy(v)).unwrap_or(false)
        )),
        num_params: NumParams::Variadic(0..2),
    },
    "parseFloat" => Builtin {
        symbol: "parseFloat",
        operator: |items| number(items[0], "parseFloat", js_op::parse_float),
        num_params: NumParams::Unary,
    },
    "parseInt" => Builtin {
        symbol: "parseInt",
        operator: parse_int,
        num_params: NumParams::Variadic(1..3),
    },
    "isNaN" => Builtin {
        symbol: "isNaN",
        operator: |items| Ok(Value::Bool(js_op::to_number(items[0]).is_none())),
        num_params: NumParams::Unary,
    },
    "JSON.stringify" => Builtin {
        symbol: "JSON.stringify",
        operator: |items| serde_json::to_string(items[0])
            .map(Value::String)
            .map_err(|e| Error::UnexpectedError(e.to_string())),
        num_params: NumParams::Unary,
    },
    "JSON.parse" => Builtin {
        symbol: "JSON.parse",
        operator: |items| serde_json::from_str(&js_op::to_string(items[0]))
            .map_err(|e| Error::InvalidArgument {
                value: items[0].clone(),
                operation: "JSON.parse".into(),
                reason: e.to_string(),
            }),
        num_params: NumParams::Unary,
    },
    "console.log" => Builtin {
        symbol: "console.log",
        operator: console_log,
        num_params: NumParams::Any,
    },
};

pub const METHOD_MAP: phf::Map<&'static str, Method> = phf_map! {
    "toUpperCase" => Method {
        symbol: "toUpperCase",
        operator: |recv, _| string_receiver(recv, "toUpperCase")
            .map(|s| Value::String(s.to_uppercase())),
        num_params: NumParams::None,
    },
    "toLowerCase" => Method {
        symbol: "toLowerCase",
        operator: |recv, _| string_receiver(recv, "toLowerCase")
            .map(|s| Value::String(s.to_lowercase())),
        num_params: NumParams::None,
    },
    "trim" => Method {
        symbol: "trim",
        operator: |recv, _| string_receiver(recv, "trim")
            .map(|s| Value::String(s.trim().to_string())),
        num_params: NumParams::None,
    },
    "includes" => Method {
        symbol: "includes",
        operator: |recv, items| index_of(recv, items[0], "includes")
            .map(|idx| Value::Bool(idx.is_some())),
        num_params: NumParams::Unary,
    },
    "indexOf" => Method {
        symbol: "indexOf",
        operator: |recv, items| index_of(recv, items[0], "indexOf").map(position),
        num_params: NumParams::Unary,
    },
    "join" => Method {
        symbol: "join",
        operator: join,
        num_params: NumParams::Variadic(0..2),
    },
    "slice" => Method {
        symbol: "slice",
        operator: slice,
        num_params: NumParams::Variadic(0..3),
    },
    "concat" => Method {
        symbol: "concat",
        operator: concat,
        num_params: NumParams::Any,
    },
};

pub const ARRAY_METHOD_MAP: phf::Map<&'static str, ArrayMethod> = phf_map! {
    "push" => ArrayMethod {
        symbol: "push",
        operator: push,
        num_params: NumParams::Any,
    },
    "includes" => ArrayMethod {
        symbol: "includes",
        operator: |_, array, items| Ok(JsValue::from(
            array.borrow().iter().any(|item| item.strict_eq(&items[0]))
        )),
        num_params: NumParams::Unary,
    },
    "indexOf" => ArrayMethod {
        symbol: "indexOf",
        operator: |_, array, items| Ok(JsValue::Primitive(position(
            array.borrow().iter().position(|item| item.strict_eq(&items[0]))
        ))),
        num_params: NumParams::Unary,
    },
    "slice" => ArrayMethod {
        symbol: "slice",
        operator: array_slice,
        num_params: NumParams::Variadic(0..3),
    },
    "concat" => ArrayMethod {
        symbol: "concat",
        operator: array_concat,
        num_params: NumParams::Any,
    },
};

/// Constants reachable through global objects, e.g. `Math.PI`
pub fn constant(path: &str) -> Option<Value> {
    match path {
        "Math.PI" => js_op::number_value(std::f64::consts::PI),
        "Math.E" => js_op::number_value(std::f64::consts::E),
        "Number.MAX_SAFE_INTEGER" => js_op::number_value(9007199254740991.0),
        "Number.MIN_SAFE_INTEGER" => js_op::number_value(-9007199254740991.0),
        _ => None,
    }
}

fn number(value: &Value, operation: &str, convert: fn(&Value) -> Option<f64>) -> Result<Value, Error> {
    convert(value)
        .ok_or(Error::UnrepresentableNumber {
            operation: operation.into(),
            number: f64::NAN,
        })
        .and_then(|num| js_op::to_number_value(num, operation))
}

fn math(value: &Value, operation: &str, func: fn(f64) -> f64) -> Result<Value, Error> {
    let num = js_op::to_number(value).ok_or_else(|| Error::InvalidArgument {
        value: value.clone(),
        operation: operation.into(),
        reason: "Could not convert value to number.".into(),
    })?;
    js_op::to_number_value(func(num), operation)
}

pub fn power(base: &Value, exponent: &Value) -> Result<Value, Error> {
    let to_num = |value: &Value| {
        js_op::to_number(value).ok_or_else(|| Error::InvalidArgument {
            value: value.clone(),
            operation: "**".into(),
            reason: "Could not convert value to number.".into(),
        })
    };
    js_op::to_number_value(to_num(base)?.powf(to_num(exponent)?), "**")
}

/// Parse the leading integer of a string in the given radix.
fn parse_int(items: &[&Value]) -> Result<Value, Error> {
    let text = js_op::to_string(items[0]);
    let radix = match items.get(1) {
        Some(r) => js_op::to_number(r)
            .filter(|r| (2.0..=36.0).contains(r))
            .ok_or_else(|| Error::InvalidArgument {
                value: (*r).clone(),
                operation: "parseInt".into(),
                reason: "Radix must be a number between 2 and 36".into(),
            })? as u32,
        None => 10,
    };
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = match radix {
        16 => digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits),
        _ => digits,
    };
    let leading: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    let parsed = i64::from_str_radix(&leading, radix).map_err(|_| Error::UnrepresentableNumber {
        operation: "parseInt".into(),
        number: f64::NAN,
    })?;
    Ok(Value::from(if negative { -parsed } else { parsed }))
}

/// Log the call's arguments, separated by spaces
fn console_log(items: &[&Value]) -> Result<Value, Error> {
    let line = items
        .iter()
        .map(|v| js_op::to_string(v))
        .collect::<Vec<String>>()
        .join(" ");
    info!("{}", line);
    Ok(Value::Null)
}

fn string_receiver<'a>(recv: &'a Value, operation: &str) -> Result<&'a str, Error> {
    match recv {
        Value::String(s) => Ok(s),
        _ => Err(Error::InvalidArgument {
            value: recv.clone(),
            operation: operation.into(),
            reason: "Receiver must be a string".into(),
        }),
    }
}

/// An `indexOf` result, -1 when there is no match
fn position(idx: Option<usize>) -> Value {
    idx.map(|i| Value::from(i as i64)).unwrap_or_else(|| Value::from(-1))
}

fn index_of(recv: &Value, needle: &Value, operation: &str) -> Result<Option<usize>, Error> {
    let s = string_receiver(recv, operation)?;
    let needle = js_op::to_string(needle);
    Ok(s.find(&needle).map(|byte_idx| s[..byte_idx].chars().count()))
}

fn join(recv: &Value, items: &[&Value]) -> Result<Value, Error> {
    let separator = items
        .first()
        .map(|sep| js_op::to_string(sep))
        .unwrap_or_else(|| String::from(","));
    match recv {
        Value::Array(values) => {
            let parts = values
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    _ => js_op::to_string(v),
                })
                .collect::<Vec<String>>();
            let separators = separator.len().saturating_mul(parts.len().saturating_sub(1));
            let len = parts.iter().map(String::len).sum::<usize>().saturating_add(separators);
            value::check_string_len(len, "join")?;
            Ok(Value::String(parts.join(&separator)))
        }
        _ => Err(Error::InvalidArgument {
            value: recv.clone(),
            operation: "join".into(),
            reason: "Receiver must be an array".into(),
        }),
    }
}

/// Resolve a possibly negative slice bound against a length.
fn relative_index(arg: Option<&Value>, len: usize, default: usize) -> Result<usize, Error> {
    let num = match arg {
        None | Some(Value::Null) => return Ok(default),
        Some(v) => js_op::to_number(v).ok_or_else(|| Error::InvalidArgument {
            value: v.clone(),
            operation: "slice".into(),
            reason: "Slice bounds must be numbers".into(),
        })?,
    };
    let len = len as f64;
    let idx = if num < 0.0 { (len + num.trunc()).max(0.0) } else { num.trunc().min(len) };
    Ok(idx as usize)
}

fn slice(recv: &Value, items: &[&Value]) -> Result<Value, Error> {
    let s = string_receiver(recv, "slice")?;
    let len = s.chars().count();
    let start = relative_index(items.get(0).copied(), len, 0)?;
    let end = relative_index(items.get(1).copied(), len, len)?;
    Ok(Value::String(
        s.chars().skip(start).take(end.saturating_sub(start)).collect(),
    ))
}

fn concat(recv: &Value, items: &[&Value]) -> Result<Value, Error> {
    let mut rv = string_receiver(recv, "concat")?.to_string();
    for item in items {
        rv.push_str(&js_op::to_string(item));
        value::check_string_len(rv.len(), "concat")?;
    }
    Ok(Value::String(rv))
}

/// Append to the array in place, returning its new length.
fn push(heap: &mut Heap, array: &ArrayNode, items: &[JsValue]) -> Result<JsValue, Error> {
    let mut values = array.borrow_mut();
    value::check_array_len(values.len() + items.len(), "push")?;
    heap.account(items.len());
    values.extend(items.iter().cloned());
    Ok(JsValue::Primitive(Value::from(values.len() as u64)))
}

fn array_slice(heap: &mut Heap, array: &ArrayNode, items: &[JsValue]) -> Result<JsValue, Error> {
    let bound = |idx: usize| match items.get(idx) {
        None => Ok(None),
        Some(JsValue::Primitive(v)) => Ok(Some(v)),
        Some(other) => Err(Error::InvalidArgument {
            value: Value::String(other.type_of().into()),
            operation: "slice".into(),
            reason: "Slice bounds must be numbers".into(),
        }),
    };
    let picked: Vec<JsValue> = {
        let values = array.borrow();
        let start = relative_index(bound(0)?, values.len(), 0)?;
        let end = relative_index(bound(1)?, values.len(), values.len())?;
        values
            .iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .cloned()
            .collect()
    };
    heap.array(picked)
}

/// Join arrays, keeping their items shared rather than copied.
fn array_concat(heap: &mut Heap, array: &ArrayNode, items: &[JsValue]) -> Result<JsValue, Error> {
    let mut rv = array.borrow().clone();
    for item in items {
        match item {
            JsValue::Array(more) => rv.extend(more.borrow().iter().cloned()),
            other => rv.push(other.clone()),
        }
        value::check_array_len(rv.len(), "concat")?;
    }
    heap.array(rv)
}
