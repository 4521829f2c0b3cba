//! JavaScript semantics for runtime values
//!
//! The interpreter stores runtime values as `serde_json::Value`, so the
//! operators here follow the ECMAScript abstract operations as closely as
//! JSON allows. There is no `undefined` (it is `null`), and no `NaN` or
//! `Infinity`: operations that would produce them return `None` or an
//! error instead.

use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::f64;
use std::str::FromStr;

use crate::error::Error;

// Largest integer that survives a round trip through f64
const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

/// Convert a float into a JSON value, JavaScript style.
///
/// Integral values become JSON integers, so `1 + 1` is `2` rather than
/// `2.0`. Returns `None` for `NaN` and the infinities.
///
/// ```rust
/// use serde_json::json;
/// use farse_rs::js_op::number_value;
///
/// assert_eq!(number_value(2.0), Some(json!(2)));
/// assert_eq!(number_value(-0.5), Some(json!(-0.5)));
/// assert_eq!(number_value(f64::NAN), None);
/// ```
pub fn number_value(num: f64) -> Option<Value> {
    if num.is_finite() && num.fract() == 0.0 && num.abs() <= MAX_SAFE_INTEGER {
        Some(Value::from(num as i64))
    } else {
        Number::from_f64(num).map(Value::Number)
    }
}

/// Like `number_value`, but failing with an error naming the operation.
pub fn to_number_value(num: f64, operation: &str) -> Result<Value, Error> {
    number_value(num).ok_or(Error::UnrepresentableNumber {
        operation: operation.into(),
        number: num,
    })
}

fn number_to_string(num: &Number) -> String {
    if let Some(int) = num.as_i64() {
        int.to_string()
    } else if let Some(uint) = num.as_u64() {
        uint.to_string()
    } else {
        // f64's Display drops a trailing ".0", matching JS
        num.as_f64().map(|f| f.to_string()).unwrap_or_default()
    }
}

/// Array elements render null as an empty slot
fn element_string(item: &Value) -> String {
    match item {
        Value::Null => String::new(),
        other => to_string(other),
    }
}

/// `String(value)`
pub fn to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => number_to_string(num),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(element_string)
            .collect::<Vec<String>>()
            .join(","),
        Value::Object(_) => "[object Object]".into(),
    }
}

/// JavaScript truthiness.
///
/// Unlike some JSON rule languages, every array and object is truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(val) => *val,
        Value::Number(val) => val.as_f64().map(|num| num != 0.0).unwrap_or(false),
        Value::String(val) => !val.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The result of the `typeof` operator
pub fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
    }
}

/// A primitive as produced by ToPrimitive with a number hint
enum Primitive {
    Number(f64),
    Text(String),
}

impl Primitive {
    /// Arrays and objects have no numeric `valueOf`, so they fall back to
    /// their string form, as do strings themselves.
    fn of(value: &Value) -> Primitive {
        match value {
            Value::Null => Primitive::Number(0.0),
            Value::Bool(flag) => Primitive::Number(if *flag { 1.0 } else { 0.0 }),
            Value::Number(num) => match num.as_f64() {
                Some(num) => Primitive::Number(num),
                None => Primitive::Text(number_to_string(num)),
            },
            Value::String(_) | Value::Array(_) | Value::Object(_) => {
                Primitive::Text(to_string(value))
            }
        }
    }

    fn number(self) -> Option<f64> {
        match self {
            Primitive::Number(num) => Some(num),
            Primitive::Text(text) => str_to_number(text),
        }
    }
}

/// `Number(string)`, with `None` standing in for `NaN`.
///
/// Blank strings are zero, and a `0x` prefix reads hexadecimal.
pub fn str_to_number<S: AsRef<str>>(string: S) -> Option<f64> {
    let text = string.as_ref().trim();
    if text.is_empty() {
        return Some(0.0);
    }
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok().map(|int| int as f64),
        None => f64::from_str(text).ok().filter(|num| num.is_finite()),
    }
}

/// `Number(value)`, returning `None` where JS would produce `NaN`.
pub fn to_number(value: &Value) -> Option<f64> {
    Primitive::of(value).number()
}

fn numeric_operand(value: &Value, operation: &str) -> Result<f64, Error> {
    to_number(value).ok_or_else(|| Error::InvalidArgument {
        value: value.clone(),
        operation: operation.into(),
        reason: "Could not convert value to number.".into(),
    })
}

fn is_compound(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn bool_number(flag: bool) -> Value {
    Value::from(flag as i64)
}

/// The `==` operator
///
/// Follows the Abstract Equality Comparison algorithm (ECMA-262 7.2.14).
/// Two arrays or objects are equal only when they are the same value.
///
/// ```rust
/// use serde_json::json;
/// use farse_rs::js_op::abstract_eq;
///
/// assert!(abstract_eq(&json!(1.0), &json!(1)));
/// assert!(abstract_eq(&json!("1"), &json!(1)));
/// assert!(abstract_eq(&json!(true), &json!("1")));
/// assert!(abstract_eq(&json!([1, 2]), &json!("1,2")));
/// assert!(!abstract_eq(&json!({}), &json!({})));
/// assert!(!abstract_eq(&json!(null), &json!(0)));
/// ```
pub fn abstract_eq(first: &Value, second: &Value) -> bool {
    match (first, second) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(flag), _) => abstract_eq(&bool_number(*flag), second),
        (_, Value::Bool(flag)) => abstract_eq(first, &bool_number(*flag)),
        _ if is_compound(first) && is_compound(second) => std::ptr::eq(first, second),
        _ if is_compound(first) => abstract_eq(&Value::String(to_string(first)), second),
        _ if is_compound(second) => abstract_eq(first, &Value::String(to_string(second))),
        (Value::String(x), Value::String(y)) => x == y,
        _ => match (to_number(first), to_number(second)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

pub fn abstract_ne(first: &Value, second: &Value) -> bool {
    !abstract_eq(first, second)
}

/// The `===` operator
///
/// Primitives must share a type and value. Arrays and objects are only
/// equal to themselves.
pub fn strict_eq(first: &Value, second: &Value) -> bool {
    match (first, second) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ if is_compound(first) || is_compound(second) => std::ptr::eq(first, second),
        _ => first == second,
    }
}

pub fn strict_ne(first: &Value, second: &Value) -> bool {
    !strict_eq(first, second)
}

/// Abstract relational comparison, yielding None when the operands are
/// incomparable (where JS would compare against NaN).
fn compare(first: &Value, second: &Value) -> Option<Ordering> {
    match (Primitive::of(first), Primitive::of(second)) {
        (Primitive::Text(x), Primitive::Text(y)) => Some(x.cmp(&y)),
        (x, y) => x.number()?.partial_cmp(&y.number()?),
    }
}

/// The `<` operator
///
/// ```rust
/// use serde_json::json;
/// use farse_rs::js_op::abstract_lt;
///
/// assert!(abstract_lt(&json!(-1), &json!(0)));
/// assert!(abstract_lt(&json!("-1"), &json!(0)));
/// assert!(abstract_lt(&json!("a"), &json!("b")));
/// assert!(!abstract_lt(&json!(0), &json!("a")));
/// ```
pub fn abstract_lt(first: &Value, second: &Value) -> bool {
    compare(first, second) == Some(Ordering::Less)
}

pub fn abstract_gt(first: &Value, second: &Value) -> bool {
    compare(first, second) == Some(Ordering::Greater)
}

/// Incomparable values are never less-or-equal.
pub fn abstract_lte(first: &Value, second: &Value) -> bool {
    matches!(compare(first, second), Some(Ordering::Less) | Some(Ordering::Equal))
}

pub fn abstract_gte(first: &Value, second: &Value) -> bool {
    matches!(compare(first, second), Some(Ordering::Greater) | Some(Ordering::Equal))
}

/// `Math.max` over already-evaluated arguments
pub fn abstract_max(items: &[&Value]) -> Result<f64, Error> {
    items.iter().try_fold(f64::NEG_INFINITY, |max, item| {
        numeric_operand(item, "max").map(|num| num.max(max))
    })
}

/// `Math.min` over already-evaluated arguments
pub fn abstract_min(items: &[&Value]) -> Result<f64, Error> {
    items.iter().try_fold(f64::INFINITY, |min, item| {
        numeric_operand(item, "min").map(|num| num.min(min))
    })
}

/// The `+` operator
///
/// Two numeric primitives add. If either side is a string, array or
/// object, both sides concatenate as strings.
pub fn abstract_plus(first: &Value, second: &Value) -> Result<Value, Error> {
    match (Primitive::of(first), Primitive::of(second)) {
        (Primitive::Number(x), Primitive::Number(y)) => to_number_value(x + y, "+"),
        (x, y) => {
            let text = |prim: Primitive, value: &Value| match prim {
                Primitive::Text(text) => text,
                Primitive::Number(_) => to_string(value),
            };
            Ok(Value::String(text(x, first) + &text(y, second)))
        }
    }
}

pub fn abstract_minus(first: &Value, second: &Value) -> Result<f64, Error> {
    Ok(numeric_operand(first, "-")? - numeric_operand(second, "-")?)
}

pub fn abstract_mul(first: &Value, second: &Value) -> Result<f64, Error> {
    Ok(numeric_operand(first, "*")? * numeric_operand(second, "*")?)
}

pub fn abstract_div(first: &Value, second: &Value) -> Result<f64, Error> {
    Ok(numeric_operand(first, "/")? / numeric_operand(second, "/")?)
}

pub fn abstract_mod(first: &Value, second: &Value) -> Result<f64, Error> {
    Ok(numeric_operand(first, "%")? % numeric_operand(second, "%")?)
}

/// Unary minus
pub fn to_negative(val: &Value) -> Result<f64, Error> {
    numeric_operand(val, "unary -").map(|v| -v)
}

/// Length of the longest prefix of `text` that reads as a decimal literal:
/// sign, digits, fraction, then an exponent only if it has digits.
fn float_prefix(text: &str) -> usize {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        start
            + bytes[start..]
                .iter()
                .take_while(|byte| byte.is_ascii_digit())
                .count()
    };
    let mut end = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };
    end = digits_from(end);
    if bytes.get(end) == Some(&b'.') {
        end = digits_from(end + 1);
    }
    if let Some(b'e') | Some(b'E') = bytes.get(end) {
        let sign = match bytes.get(end + 1) {
            Some(b'+') | Some(b'-') => 1,
            _ => 0,
        };
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }
    end
}

/// `parseFloat`: read the leading decimal literal of the value's string
/// form, ignoring surrounding whitespace and anything after it.
pub fn parse_float(val: &Value) -> Option<f64> {
    match val {
        Value::Number(num) => num.as_f64(),
        _ => {
            let text = to_string(val);
            let text = text.trim_start();
            text[..float_prefix(text)]
                .parse::<f64>()
                .ok()
                .filter(|num| num.is_finite())
        }
    }
}
