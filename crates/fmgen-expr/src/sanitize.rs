//! Convert an interpreter result into plain metadata.
//!
//! Only data crosses the sandbox boundary. Functions, built-in objects and
//! the query API handle are rejected with the key path where they were
//! found.

use fmgen_core::{Metadata, Value};

use crate::error::SchemaError;
use crate::value::{RtMap, RtValue};

/// Top level must be an object.
pub fn sanitize(raw: &RtValue) -> Result<Metadata, SchemaError> {
    match raw {
        RtValue::Map(map) => sanitize_map(map, ""),
        other => Err(SchemaError {
            path: String::new(),
            reason: format!("expected an object, found {}", other.describe()),
        }),
    }
}

fn sanitize_map(map: &RtMap, path: &str) -> Result<Metadata, SchemaError> {
    map.iter()
        .map(|(key, value)| {
            let child = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            Ok((key.clone(), sanitize_value(value, &child)?))
        })
        .collect()
}

fn sanitize_value(value: &RtValue, path: &str) -> Result<Value, SchemaError> {
    let reject = |reason: String| SchemaError {
        path: path.to_string(),
        reason,
    };
    Ok(match value {
        RtValue::Undefined => Value::Undefined,
        RtValue::Null => Value::Null,
        RtValue::Bool(b) => Value::Bool(*b),
        RtValue::Int(i) => Value::Integer(*i),
        RtValue::Float(f) => Value::Float(*f),
        RtValue::Str(s) => Value::String(s.to_string()),
        RtValue::Date(d) => Value::Date(*d),
        RtValue::DateTime(dt) => Value::DateTime(*dt),
        RtValue::List(items) => Value::List(
            items
                .iter()
                .enumerate()
                .map(|(idx, item)| sanitize_value(item, &format!("{path}[{idx}]")))
                .collect::<Result<_, _>>()?,
        ),
        RtValue::Map(map) => Value::Map(sanitize_map(map, path)?),
        RtValue::Closure(_) | RtValue::Native(_) | RtValue::Method(_) => {
            return Err(reject("functions cannot be stored in frontmatter".into()))
        }
        RtValue::Namespace(name) => return Err(reject(format!("built-in object {name} cannot be stored in frontmatter"))),
        RtValue::Host(_) => return Err(reject("the query API cannot be stored in frontmatter".into())),
    })
}
