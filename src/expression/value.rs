//! JavaScript-flavored value semantics shared by both evaluator backends.
//!
//! Schema authors write conditions the way they would in a browser
//! (`!!$.name?.length`, `$.age >= 18`, `$.role == 'admin'`), so truthiness,
//! equality, comparison and the handful of supported built-in methods follow
//! JavaScript rules. Both backends route every operator through this module,
//! which is what keeps them in agreement.
//!
//! Values are `serde_json::Value`s wrapped in [`Operand`], where `None` is
//! JavaScript `undefined` and `Some(Value::Null)` is `null`. Non-finite numeric
//! results (`NaN`, `Infinity`) cannot be represented in JSON and collapse to
//! `null` once they leave an arithmetic operation.

use serde_json::{Map, Number, Value};
use std::borrow::Cow;

/// An evaluated value; `None` is `undefined`.
pub type Operand = Option<Value>;

/// Comparison operators, in both backends' spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CompareOp {
    /// Equality operators, longest spelling first.
    pub const EQUALITY: [(&'static str, Self); 4] = [
        ("===", Self::StrictEq),
        ("!==", Self::StrictNe),
        ("==", Self::Eq),
        ("!=", Self::Ne),
    ];

    /// Relational operators, longest spelling first.
    pub const RELATIONAL: [(&'static str, Self); 4] = [
        (">=", Self::Ge),
        ("<=", Self::Le),
        (">", Self::Gt),
        ("<", Self::Lt),
    ];

    /// Maps an operator token onto its variant.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::EQUALITY
            .iter()
            .chain(Self::RELATIONAL.iter())
            .find(|(s, _)| *s == symbol)
            .map(|(_, op)| *op)
    }
}

/// Arithmetic operators supported by the unrestricted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Builds a JSON number, keeping integral values integral so that `1 + 1`
/// serializes as `2` rather than `2.0`.
#[must_use]
pub fn number(n: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        #[allow(clippy::cast_possible_truncation)]
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// JavaScript truthiness.
#[must_use]
pub fn truthy(value: &Operand) -> bool {
    truthy_ref(value.as_ref())
}

/// [`truthy`] for a borrowed value.
#[must_use]
pub fn truthy_ref(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// `true` for `null` and `undefined`.
#[must_use]
pub fn is_nullish(value: &Operand) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// JavaScript `ToNumber`.
#[must_use]
pub fn to_number(value: &Operand) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => string_to_number(s),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(&Some(single.clone())),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust also accepts "inf" and "nan", JavaScript does not.
        t if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        t => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// JavaScript `ToString`.
#[must_use]
pub fn to_js_string(value: &Operand) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_js_string(&Some(other.clone())),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// JavaScript `typeof`.
#[must_use]
pub fn type_of(value: &Operand) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Null | Value::Array(_) | Value::Object(_)) => "object",
    }
}

/// `===`. Arrays and objects compare structurally since values carry no identity.
#[must_use]
pub fn strict_equals(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            a.as_f64().zip(b.as_f64()).is_some_and(|(a, b)| a == b)
        }
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// `==` with JavaScript's coercions for the primitive cases.
#[must_use]
pub fn loose_equals(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (l, r) if is_nullish(l) || is_nullish(r) => is_nullish(l) && is_nullish(r),
        (Some(Value::Bool(_)), _) => loose_equals(&Some(number(to_number(left))), right),
        (_, Some(Value::Bool(_))) => loose_equals(left, &Some(number(to_number(right)))),
        (Some(Value::Number(_)), Some(Value::String(_)))
        | (Some(Value::String(_)), Some(Value::Number(_))) => to_number(left) == to_number(right),
        _ => strict_equals(left, right),
    }
}

/// Applies a comparison operator.
#[must_use]
pub fn compare(op: CompareOp, left: &Operand, right: &Operand) -> bool {
    match op {
        CompareOp::StrictEq => strict_equals(left, right),
        CompareOp::StrictNe => !strict_equals(left, right),
        CompareOp::Eq => loose_equals(left, right),
        CompareOp::Ne => !loose_equals(left, right),
        CompareOp::Ge | CompareOp::Le | CompareOp::Gt | CompareOp::Lt => {
            if let (Some(Value::String(a)), Some(Value::String(b))) = (left, right) {
                return match op {
                    CompareOp::Ge => a >= b,
                    CompareOp::Le => a <= b,
                    CompareOp::Gt => a > b,
                    _ => a < b,
                };
            }
            let (a, b) = (to_number(left), to_number(right));
            match op {
                CompareOp::Ge => a >= b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                _ => a < b,
            }
        }
    }
}

/// Applies an arithmetic operator. `+` concatenates when either side is a string.
#[must_use]
pub fn arithmetic(op: ArithOp, left: &Operand, right: &Operand) -> Operand {
    if op == ArithOp::Add {
        let stringy = |v: &Operand| matches!(v, Some(Value::String(_) | Value::Array(_) | Value::Object(_)));
        if stringy(left) || stringy(right) {
            return Some(Value::String(to_js_string(left) + &to_js_string(right)));
        }
    }
    let (a, b) = (to_number(left), to_number(right));
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Rem => a % b,
    };
    Some(number(result))
}

/// Reads a property the way JavaScript member access does on JSON-shaped data.
///
/// Returns `None` for a missing property. Callers handle `null`/`undefined`
/// receivers themselves, since whether that is an error depends on optional
/// chaining.
#[must_use]
pub fn get_property<'v>(target: &'v Value, key: &str) -> Option<Cow<'v, Value>> {
    match target {
        Value::Object(map) => map.get(key).map(Cow::Borrowed),
        Value::Array(items) => {
            if key == "length" {
                return Some(Cow::Owned(Value::from(items.len())));
            }
            key.parse::<usize>().ok().and_then(|i| items.get(i)).map(Cow::Borrowed)
        }
        Value::String(s) => {
            if key == "length" {
                return Some(Cow::Owned(Value::from(s.chars().count())));
            }
            key.parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Cow::Owned(Value::String(c.to_string())))
        }
        _ => None,
    }
}

/// Steps one property deeper, keeping borrows when the parent is borrowed.
#[must_use]
pub fn step<'v>(current: Cow<'v, Value>, key: &str) -> Option<Cow<'v, Value>> {
    match current {
        Cow::Borrowed(value) => get_property(value, key),
        Cow::Owned(value) => get_property(&value, key).map(|v| Cow::Owned(v.into_owned())),
    }
}

fn arg_string(args: &[Operand], index: usize) -> String {
    args.get(index).map_or_else(|| "undefined".to_string(), to_js_string)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn relative_index(args: &[Operand], index: usize, len: usize, default: usize) -> usize {
    match args.get(index) {
        None | Some(None) => default,
        Some(arg) => {
            let n = to_number(arg);
            if n.is_nan() {
                return 0;
            }
            let n = n.trunc() as i64;
            if n < 0 {
                (len as i64 + n).max(0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    }
}

/// Calls one of the supported built-in methods on `receiver`.
///
/// Returns `None` when the receiver has no method of that name, so callers can
/// distinguish "not a function" from a method that ran and failed.
#[must_use]
pub fn call_method(receiver: &Value, name: &str, args: &[Operand]) -> Option<Result<Operand, String>> {
    let result = match (receiver, name) {
        (Value::String(s), "includes") => Value::Bool(s.contains(&arg_string(args, 0))),
        (Value::String(s), "startsWith") => Value::Bool(s.starts_with(&arg_string(args, 0))),
        (Value::String(s), "endsWith") => Value::Bool(s.ends_with(&arg_string(args, 0))),
        (Value::String(s), "indexOf") => {
            let needle = arg_string(args, 0);
            let index = s
                .find(&needle)
                .map_or(-1, |byte| i64::try_from(s[..byte].chars().count()).unwrap_or(-1));
            Value::from(index)
        }
        (Value::String(s), "trim") => Value::String(s.trim().to_string()),
        (Value::String(s), "toUpperCase") => Value::String(s.to_uppercase()),
        (Value::String(s), "toLowerCase") => Value::String(s.to_lowercase()),
        (Value::String(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let start = relative_index(args, 0, chars.len(), 0);
            let end = relative_index(args, 1, chars.len(), chars.len());
            Value::String(if start < end { chars[start..end].iter().collect() } else { String::new() })
        }
        (Value::String(s), "split") => {
            let separator = arg_string(args, 0);
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(|p| Value::String(p.to_string())).collect()
            };
            Value::Array(parts)
        }
        (Value::Array(items), "includes") => {
            let needle = args.first().cloned().flatten();
            Value::Bool(items.iter().any(|item| strict_equals(&Some(item.clone()), &needle)))
        }
        (Value::Array(items), "indexOf") => {
            let needle = args.first().cloned().flatten();
            let index = items
                .iter()
                .position(|item| strict_equals(&Some(item.clone()), &needle))
                .map_or(-1, |i| i64::try_from(i).unwrap_or(-1));
            Value::from(index)
        }
        (Value::Array(items), "join") => {
            let separator = match args.first() {
                None | Some(None) => ",".to_string(),
                Some(sep) => to_js_string(sep),
            };
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => to_js_string(&Some(other.clone())),
                })
                .collect::<Vec<_>>()
                .join(&separator);
            Value::String(joined)
        }
        (Value::Number(n), "toFixed") => {
            let digits = args.first().map_or(0.0, to_number);
            if !(0.0..=100.0).contains(&digits) {
                return Some(Err("toFixed() digits argument must be between 0 and 100".to_string()));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let digits = digits as usize;
            Value::String(format!("{:.*}", digits, n.as_f64().unwrap_or(f64::NAN)))
        }
        (Value::Object(map), "hasOwnProperty") => Value::Bool(map.contains_key(&arg_string(args, 0))),
        (_, "toString") => Value::String(to_js_string(&Some(receiver.clone()))),
        _ => return None,
    };
    Some(Ok(Some(result)))
}

/// Converts an operand into a value suitable for storing in JSON containers.
#[must_use]
pub fn into_json(value: Operand) -> Value {
    value.unwrap_or(Value::Null)
}

/// Builds a JSON object from evaluated entries, dropping `undefined` members
/// the way `JSON.stringify` would.
#[must_use]
pub fn object_from(entries: Vec<(String, Operand)>) -> Value {
    let map: Map<String, Value> = entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();
    Value::Object(map)
}
