//! Frontmatter value model
//!
//! [`Value`] is the closed set of data that may live in a metadata block.
//! Anything produced by a template is narrowed to this type before it can
//! be merged or serialized, so functions and host objects never reach the
//! document.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use indexmap::IndexMap;

/// Insertion-ordered key/value map used for metadata objects at every depth.
pub type Metadata = IndexMap<String, Value>;

static UNDEFINED: Value = Value::Undefined;

/// A plain-data frontmatter value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value. Omitted when serialized inside a map.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    /// Integer numbers, including big-integer literals that fit in 64 bits.
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    List(Vec<Value>),
    Map(Metadata),
}

impl Value {
    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) | Value::DateTime(_) => "date",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Truthiness as template authors expect it: empty strings, zero, NaN,
    /// `false`, `null` and `undefined` are falsy; containers are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Date(_) | Value::DateTime(_) | Value::List(_) | Value::Map(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Metadata> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Look up `key` in a map value; anything else (or a missing key)
    /// yields `Undefined`.
    pub fn get(&self, key: &str) -> &Value {
        match self {
            Value::Map(m) => m.get(key).unwrap_or(&UNDEFINED),
            _ => &UNDEFINED,
        }
    }

    /// Canonical text of a date value (`YYYY-MM-DD` or RFC 3339).
    pub fn date_text(&self) -> Option<String> {
        match self {
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            _ => None,
        }
    }

    /// Convert a parsed YAML node. Tags are dropped and non-string keys are
    /// rendered to text.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Value {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                Value::List(items.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(mapping) => Value::Map(
                mapping
                    .into_iter()
                    .map(|(k, v)| (yaml_key_text(k), Value::from_yaml(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }

    /// Convert to a YAML node. `Undefined` has no YAML form and returns
    /// `None`; inside lists it becomes `null`.
    pub fn to_yaml(&self) -> Option<serde_yaml::Value> {
        let node = match self {
            Value::Undefined => return None,
            Value::Null => serde_yaml::Value::Null,
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Integer(i) => serde_yaml::Value::Number((*i).into()),
            Value::Float(f) => match integral(*f) {
                Some(i) => serde_yaml::Value::Number(i.into()),
                None => serde_yaml::Value::Number((*f).into()),
            },
            Value::String(s) => serde_yaml::Value::String(s.clone()),
            Value::Date(_) | Value::DateTime(_) => {
                serde_yaml::Value::String(self.date_text().unwrap_or_default())
            }
            Value::List(items) => serde_yaml::Value::Sequence(
                items
                    .iter()
                    .map(|item| item.to_yaml().unwrap_or(serde_yaml::Value::Null))
                    .collect(),
            ),
            Value::Map(map) => serde_yaml::Value::Mapping(metadata_to_yaml(map)),
        };
        Some(node)
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON rendering. Map entries holding `Undefined` are skipped, the
    /// way `JSON.stringify` drops them; non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => match integral(*f) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(_) | Value::DateTime(_) => {
                serde_json::Value::String(self.date_text().unwrap_or_default())
            }
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Structural equality. Integers and floats compare numerically; dates only
/// equal dates.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            _ => false,
        }
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Metadata> for Value {
    fn from(map: Metadata) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// YAML mapping for a metadata object, skipping `Undefined` entries.
pub fn metadata_to_yaml(map: &Metadata) -> serde_yaml::Mapping {
    map.iter()
        .filter_map(|(k, v)| v.to_yaml().map(|node| (serde_yaml::Value::String(k.clone()), node)))
        .collect()
}

/// Floats with no fractional part are written as integers, matching how
/// the template language prints numbers.
fn integral(f: f64) -> Option<i64> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    (f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE).then(|| f as i64)
}

fn yaml_key_text(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Build a [`Metadata`] map from `(key, value)` pairs.
#[macro_export]
macro_rules! metadata {
    () => { $crate::Metadata::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Metadata::new();
        $( map.insert(::std::string::String::from($key), $crate::Value::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::List(vec![]).is_truthy());
        assert!(Value::Map(Metadata::new()).is_truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_int_and_float() {
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_ne!(Value::Integer(2), Value::Float(2.5));
        assert_ne!(Value::Integer(1), Value::from("1"));
    }

    #[test]
    fn test_get_on_missing_key_is_undefined() {
        let value = Value::Map(metadata! { "a" => 1 });
        assert_eq!(value.get("a"), &Value::Integer(1));
        assert!(matches!(value.get("b"), Value::Undefined));
        assert!(matches!(Value::Null.get("a"), Value::Undefined));
    }

    #[test]
    fn test_yaml_conversion_keeps_order_and_drops_undefined() {
        let mut map = metadata! { "b" => 1, "a" => "x" };
        map.insert("gone".into(), Value::Undefined);
        let yaml = Value::Map(map).to_yaml().unwrap();
        let text = serde_yaml::to_string(&yaml).unwrap();
        assert_eq!(text, "b: 1\na: x\n");
    }

    #[test]
    fn test_integral_float_serializes_as_integer() {
        let yaml = Value::Float(4.0).to_yaml().unwrap();
        assert_eq!(serde_yaml::to_string(&yaml).unwrap(), "4\n");
        assert_eq!(Value::Float(1.5).to_json(), serde_json::json!(1.5));
    }

    #[test]
    fn test_from_yaml_nested() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("title: Note\ntags: [a, b]\nmeta:\n  n: 3\n  ok: true\n1: one")
                .unwrap();
        let value = Value::from_yaml(yaml);
        assert_eq!(value.get("title"), &Value::from("Note"));
        assert_eq!(value.get("tags"), &Value::from(vec!["a", "b"]));
        assert_eq!(value.get("meta").get("n"), &Value::Integer(3));
        assert_eq!(value.get("meta").get("ok"), &Value::Bool(true));
        assert_eq!(value.get("1"), &Value::from("one"));
    }

    #[test]
    fn test_date_rendering() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(date.date_text().as_deref(), Some("2024-03-09"));
        assert_eq!(date.to_json(), serde_json::json!("2024-03-09"));
    }

    #[test]
    fn test_json_skips_undefined_entries() {
        let mut map = Metadata::new();
        map.insert("a".into(), Value::Undefined);
        map.insert("b".into(), Value::Null);
        assert_eq!(Value::Map(map).to_json(), serde_json::json!({ "b": null }));
    }
}
