//! Runtime values
//!
//! [`RtValue`] is what the interpreter computes with. Containers are
//! immutable and reference counted, so sharing is cheap and cycles cannot
//! be built. Functions and host handles exist only here; the sanitizer
//! rejects them before a result leaves the sandbox.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use indexmap::IndexMap;

use fmgen_core::{QueryApi, Value};

use crate::ast::Expr;

pub type RtMap = IndexMap<String, RtValue>;

#[derive(Clone)]
pub enum RtValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    List(Rc<Nested<Vec<RtValue>>>),
    Map(Rc<Nested<RtMap>>),
    Closure(Rc<Closure>),
    /// Built-in function, by qualified name (`Math.floor`, `parseInt`).
    Native(&'static str),
    /// Built-in method bound to its receiver (`"abc".toUpperCase`).
    Method(Rc<BoundMethod>),
    /// Built-in object such as `Math` or `JSON`.
    Namespace(&'static str),
    /// The host query API.
    Host(Arc<dyn QueryApi>),
}

/// Container body together with how deeply values nest inside it.
///
/// The depth is computed once when the container is built, so limits on
/// nesting cost nothing to check.
pub struct Nested<T> {
    inner: T,
    depth: usize,
}

impl<T> Nested<T> {
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl<T> Deref for Nested<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

pub struct Closure {
    pub params: Rc<[String]>,
    pub body: Rc<Expr>,
    pub scope: Option<Rc<Scope>>,
}

impl Closure {
    /// Captured values nest one level below the closure.
    pub fn depth(&self) -> usize {
        1 + self.scope.as_ref().map_or(0, |scope| scope.depth)
    }
}

/// Lexical scope created by a function call.
pub struct Scope {
    pub vars: Vec<(String, RtValue)>,
    pub parent: Option<Rc<Scope>>,
    depth: usize,
}

impl Scope {
    pub fn new(vars: Vec<(String, RtValue)>, parent: Option<Rc<Scope>>) -> Self {
        let depth = vars
            .iter()
            .map(|(_, value)| value.depth())
            .chain(parent.as_ref().map(|p| p.depth))
            .max()
            .unwrap_or(0);
        Self { vars, parent, depth }
    }

    pub fn lookup(&self, name: &str) -> Option<&RtValue> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some((_, value)) = s.vars.iter().find(|(n, _)| n == name) {
                return Some(value);
            }
            scope = s.parent.as_deref();
        }
        None
    }
}

pub struct BoundMethod {
    pub receiver: RtValue,
    pub name: String,
}

/// A number, kept integral when possible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn to_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn is_nan(self) -> bool {
        matches!(self, Num::Float(f) if f.is_nan())
    }

    pub fn into_value(self) -> RtValue {
        match self {
            Num::Int(i) => RtValue::Int(i),
            Num::Float(f) => RtValue::Float(f),
        }
    }
}

impl RtValue {
    pub fn str(s: impl AsRef<str>) -> Self {
        RtValue::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<RtValue>) -> Self {
        let depth = 1 + items.iter().map(RtValue::depth).max().unwrap_or(0);
        RtValue::List(Rc::new(Nested { inner: items, depth }))
    }

    pub fn map(map: RtMap) -> Self {
        let depth = 1 + map.values().map(RtValue::depth).max().unwrap_or(0);
        RtValue::Map(Rc::new(Nested { inner: map, depth }))
    }

    /// Levels of containers, closures and bound methods below and
    /// including this value. Scalars are 0.
    pub fn depth(&self) -> usize {
        match self {
            RtValue::List(items) => items.depth(),
            RtValue::Map(map) => map.depth(),
            RtValue::Closure(closure) => closure.depth(),
            RtValue::Method(method) => 1 + method.receiver.depth(),
            _ => 0,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            RtValue::Undefined => "undefined",
            RtValue::Bool(_) => "boolean",
            RtValue::Int(_) | RtValue::Float(_) => "number",
            RtValue::Str(_) => "string",
            RtValue::Closure(_) | RtValue::Native(_) | RtValue::Method(_) => "function",
            RtValue::Null
            | RtValue::Date(_)
            | RtValue::DateTime(_)
            | RtValue::List(_)
            | RtValue::Map(_)
            | RtValue::Namespace(_)
            | RtValue::Host(_) => "object",
        }
    }

    /// Descriptive type name for messages.
    pub fn describe(&self) -> &'static str {
        match self {
            RtValue::Undefined => "undefined",
            RtValue::Null => "null",
            RtValue::Bool(_) => "boolean",
            RtValue::Int(_) | RtValue::Float(_) => "number",
            RtValue::Str(_) => "string",
            RtValue::Date(_) | RtValue::DateTime(_) => "date",
            RtValue::List(_) => "array",
            RtValue::Map(_) => "object",
            RtValue::Closure(_) | RtValue::Native(_) | RtValue::Method(_) => "function",
            RtValue::Namespace(_) => "built-in object",
            RtValue::Host(_) => "query API",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, RtValue::Undefined | RtValue::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            RtValue::Closure(_) | RtValue::Native(_) | RtValue::Method(_)
        ) || matches!(self, RtValue::Namespace(name) if *name == "Date")
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            RtValue::Undefined | RtValue::Null => false,
            RtValue::Bool(b) => *b,
            RtValue::Int(i) => *i != 0,
            RtValue::Float(f) => *f != 0.0 && !f.is_nan(),
            RtValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `Number(value)`.
    pub fn to_number(&self) -> Num {
        match self {
            RtValue::Undefined => Num::Float(f64::NAN),
            RtValue::Null => Num::Int(0),
            RtValue::Bool(b) => Num::Int(i64::from(*b)),
            RtValue::Int(i) => Num::Int(*i),
            RtValue::Float(f) => Num::Float(*f),
            RtValue::Str(s) => parse_number(s),
            RtValue::Date(d) => Num::Int(
                d.and_hms_opt(0, 0, 0)
                    .map_or(0, |dt| dt.and_utc().timestamp_millis()),
            ),
            RtValue::DateTime(dt) => Num::Int(dt.timestamp_millis()),
            RtValue::List(items) => match items.as_slice() {
                [] => Num::Int(0),
                [single] => single.to_number(),
                _ => Num::Float(f64::NAN),
            },
            _ => Num::Float(f64::NAN),
        }
    }

    /// `String(value)`.
    pub fn to_js_string(&self) -> String {
        match self {
            RtValue::Undefined => "undefined".into(),
            RtValue::Null => "null".into(),
            RtValue::Bool(b) => b.to_string(),
            RtValue::Int(i) => i.to_string(),
            RtValue::Float(f) => number_to_string(*f),
            RtValue::Str(s) => s.to_string(),
            RtValue::Date(_) | RtValue::DateTime(_) => self.date_text().unwrap_or_default(),
            RtValue::List(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            RtValue::Map(_) | RtValue::Host(_) => "[object Object]".into(),
            RtValue::Namespace(name) => format!("[object {name}]"),
            RtValue::Closure(_) | RtValue::Native(_) | RtValue::Method(_) => {
                "function () { [native code] }".into()
            }
        }
    }

    /// Byte length of [`to_js_string`](Self::to_js_string), computed
    /// without building the text. Saturates instead of overflowing.
    pub fn text_len(&self) -> usize {
        match self {
            RtValue::Str(s) => s.len(),
            RtValue::List(items) => items
                .iter()
                .map(|item| if item.is_nullish() { 0 } else { item.text_len() })
                .fold(items.len().saturating_sub(1), usize::saturating_add),
            RtValue::Map(_) | RtValue::Host(_) => "[object Object]".len(),
            RtValue::Closure(_) | RtValue::Native(_) | RtValue::Method(_) => {
                "function () { [native code] }".len()
            }
            // Scalars render in a few dozen bytes at most.
            _ => self.to_js_string().len(),
        }
    }

    /// Lower bound on the compact JSON length of [`to_json`](Self::to_json).
    pub fn json_len(&self) -> usize {
        match self {
            RtValue::Str(s) => s.len().saturating_add(2),
            RtValue::List(items) => items
                .iter()
                .map(|item| item.json_len().max(1))
                .fold(items.len().saturating_add(1), usize::saturating_add),
            RtValue::Map(map) => map
                .iter()
                .map(|(k, v)| k.len().saturating_add(3).saturating_add(v.json_len()))
                .fold(map.len().saturating_add(1), usize::saturating_add),
            RtValue::Undefined
            | RtValue::Closure(_)
            | RtValue::Native(_)
            | RtValue::Method(_)
            | RtValue::Namespace(_)
            | RtValue::Host(_) => 0,
            _ => self.text_len(),
        }
    }

    /// Value as shown in error messages; long renderings fall back to
    /// the type name.
    pub fn snippet(&self) -> String {
        if self.text_len() <= 40 {
            self.to_js_string()
        } else {
            self.describe().to_string()
        }
    }

    pub fn date_text(&self) -> Option<String> {
        match self {
            RtValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            RtValue::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            _ => None,
        }
    }

    /// `===`. Containers compare by identity.
    pub fn strict_eq(&self, other: &RtValue) -> bool {
        match (self, other) {
            (RtValue::Undefined, RtValue::Undefined) | (RtValue::Null, RtValue::Null) => true,
            (RtValue::Bool(a), RtValue::Bool(b)) => a == b,
            (RtValue::Int(a), RtValue::Int(b)) => a == b,
            (RtValue::Int(_) | RtValue::Float(_), RtValue::Int(_) | RtValue::Float(_)) => {
                self.to_number().to_f64() == other.to_number().to_f64()
            }
            (RtValue::Str(a), RtValue::Str(b)) => a == b,
            (RtValue::Date(a), RtValue::Date(b)) => a == b,
            (RtValue::DateTime(a), RtValue::DateTime(b)) => a == b,
            (RtValue::List(a), RtValue::List(b)) => Rc::ptr_eq(a, b),
            (RtValue::Map(a), RtValue::Map(b)) => Rc::ptr_eq(a, b),
            (RtValue::Closure(a), RtValue::Closure(b)) => Rc::ptr_eq(a, b),
            (RtValue::Native(a), RtValue::Native(b)) => a == b,
            (RtValue::Namespace(a), RtValue::Namespace(b)) => a == b,
            (RtValue::Method(a), RtValue::Method(b)) => Rc::ptr_eq(a, b),
            (RtValue::Host(a), RtValue::Host(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`.
    pub fn loose_eq(&self, other: &RtValue) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (RtValue::Str(_), RtValue::Int(_) | RtValue::Float(_) | RtValue::Bool(_))
            | (RtValue::Int(_) | RtValue::Float(_) | RtValue::Bool(_), RtValue::Str(_))
            | (RtValue::Bool(_), RtValue::Int(_) | RtValue::Float(_))
            | (RtValue::Int(_) | RtValue::Float(_), RtValue::Bool(_)) => {
                self.to_number().to_f64() == other.to_number().to_f64()
            }
            (RtValue::Date(_) | RtValue::DateTime(_), RtValue::Str(s))
            | (RtValue::Str(s), RtValue::Date(_) | RtValue::DateTime(_)) => {
                let date = if matches!(self, RtValue::Str(_)) { other } else { self };
                date.date_text().as_deref() == Some(&**s)
            }
            _ => self.strict_eq(other),
        }
    }

    /// SameValueZero, used by `includes`: like `===` but NaN equals NaN.
    pub fn same_value_zero(&self, other: &RtValue) -> bool {
        let both_nan = self.to_number_if_numeric().is_some_and(f64::is_nan)
            && other.to_number_if_numeric().is_some_and(f64::is_nan);
        both_nan || self.strict_eq(other)
    }

    fn to_number_if_numeric(&self) -> Option<f64> {
        match self {
            RtValue::Int(i) => Some(*i as f64),
            RtValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Import a plain value from the evaluation context.
    pub fn from_value(value: &Value) -> RtValue {
        match value {
            Value::Undefined => RtValue::Undefined,
            Value::Null => RtValue::Null,
            Value::Bool(b) => RtValue::Bool(*b),
            Value::Integer(i) => RtValue::Int(*i),
            Value::Float(f) => RtValue::Float(*f),
            Value::String(s) => RtValue::str(s),
            Value::Date(d) => RtValue::Date(*d),
            Value::DateTime(dt) => RtValue::DateTime(*dt),
            Value::List(items) => RtValue::list(items.iter().map(RtValue::from_value).collect()),
            Value::Map(map) => RtValue::map(
                map.iter()
                    .map(|(k, v)| (k.clone(), RtValue::from_value(v)))
                    .collect(),
            ),
        }
    }

    /// JSON form used by `JSON.stringify`. Functions and undefined are
    /// skipped inside objects and become `null` inside arrays; `None`
    /// at the top level.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            RtValue::Undefined
            | RtValue::Closure(_)
            | RtValue::Native(_)
            | RtValue::Method(_)
            | RtValue::Namespace(_)
            | RtValue::Host(_) => return None,
            RtValue::Null => serde_json::Value::Null,
            RtValue::Bool(b) => serde_json::Value::Bool(*b),
            RtValue::Int(i) => serde_json::Value::from(*i),
            RtValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            RtValue::Str(s) => serde_json::Value::String(s.to_string()),
            RtValue::Date(_) | RtValue::DateTime(_) => {
                serde_json::Value::String(self.date_text().unwrap_or_default())
            }
            RtValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(serde_json::Value::Null))
                    .collect(),
            ),
            RtValue::Map(map) => serde_json::Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|json| (k.clone(), json)))
                    .collect(),
            ),
        })
    }
}

impl fmt::Debug for RtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtValue::Undefined => f.write_str("undefined"),
            RtValue::Null => f.write_str("null"),
            RtValue::Bool(b) => write!(f, "{b}"),
            RtValue::Int(i) => write!(f, "{i}"),
            RtValue::Float(n) => write!(f, "{}", number_to_string(*n)),
            RtValue::Str(s) => write!(f, "{s:?}"),
            RtValue::Date(_) | RtValue::DateTime(_) => {
                write!(f, "Date({})", self.date_text().unwrap_or_default())
            }
            RtValue::List(items) => f.debug_list().entries(items.iter()).finish(),
            RtValue::Map(map) => f.debug_map().entries(map.iter()).finish(),
            RtValue::Closure(c) => write!(f, "<closure/{}>", c.params.len()),
            RtValue::Native(name) => write!(f, "<native {name}>"),
            RtValue::Method(m) => write!(f, "<method {}>", m.name),
            RtValue::Namespace(name) => write!(f, "<{name}>"),
            RtValue::Host(_) => f.write_str("<query api>"),
        }
    }
}

/// JavaScript number formatting.
pub fn number_to_string(f: f64) -> String {
    if f.is_nan() {
        return "NaN".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    if f == 0.0 {
        return "0".into();
    }
    let abs = f.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let text = format!("{f:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    if f.fract() == 0.0 {
        return format!("{f:.0}");
    }
    format!("{f}")
}

/// String to number the way `Number("...")` does it.
pub fn parse_number(text: &str) -> Num {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Num::Int(0);
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        return match i64::from_str_radix(hex, 16) {
            Ok(n) if !negative => Num::Int(n),
            _ => Num::Float(f64::NAN),
        };
    }
    match digits {
        "Infinity" => {
            return Num::Float(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
        }
        // Rust accepts these spellings, JavaScript does not.
        d if d.eq_ignore_ascii_case("inf") || d.eq_ignore_ascii_case("infinity") || d.eq_ignore_ascii_case("nan") => {
            return Num::Float(f64::NAN);
        }
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Num::Int(i);
    }
    trimmed
        .parse::<f64>()
        .map(Num::Float)
        .unwrap_or(Num::Float(f64::NAN))
}
