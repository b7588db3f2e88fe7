//! Built-in globals and methods
//!
//! Everything here is pure: no I/O, no randomness. Dates come from the
//! clock captured in the evaluation context. String operations index by
//! Unicode scalar value.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use fmgen_core::Value;

use crate::error::{EvalResult, RuntimeError};
use crate::interpreter::Interpreter;
use crate::value::{number_to_string, parse_number, BoundMethod, Num, RtMap, RtValue};

const STRING_METHODS: &[&str] = &[
    "toUpperCase", "toLowerCase", "trim", "trimStart", "trimEnd", "split", "replace",
    "replaceAll", "startsWith", "endsWith", "includes", "indexOf", "slice", "substring",
    "padStart", "padEnd", "repeat", "at", "concat", "toString",
];

const LIST_METHODS: &[&str] = &[
    "map", "filter", "find", "findIndex", "some", "every", "includes", "indexOf", "join",
    "slice", "concat", "flat", "reverse", "sort", "reduce", "at",
];

const DATE_METHODS: &[&str] = &[
    "toISOString", "toISODate", "toFormat", "toString", "getFullYear", "getMonth", "getDate",
    "getDay", "getTime",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

/// Global identifiers available to every template.
pub(crate) fn global(name: &str) -> Option<RtValue> {
    let value = match name {
        "Math" => RtValue::Namespace("Math"),
        "Object" => RtValue::Namespace("Object"),
        "Array" => RtValue::Namespace("Array"),
        "JSON" => RtValue::Namespace("JSON"),
        "Date" => RtValue::Namespace("Date"),
        "String" => RtValue::Native("String"),
        "Number" => RtValue::Native("Number"),
        "Boolean" => RtValue::Native("Boolean"),
        "parseInt" => RtValue::Native("parseInt"),
        "parseFloat" => RtValue::Native("parseFloat"),
        "isNaN" => RtValue::Native("isNaN"),
        "isFinite" => RtValue::Native("isFinite"),
        "date" => RtValue::Native("date"),
        "today" => RtValue::Native("today"),
        "now" => RtValue::Native("now"),
        "NaN" => RtValue::Float(f64::NAN),
        "Infinity" => RtValue::Float(f64::INFINITY),
        _ => return None,
    };
    Some(value)
}

fn namespace_member(namespace: &str, name: &str) -> RtValue {
    let native = match (namespace, name) {
        ("Math", "PI") => return RtValue::Float(std::f64::consts::PI),
        ("Math", "E") => return RtValue::Float(std::f64::consts::E),
        ("Math", "floor") => "Math.floor",
        ("Math", "ceil") => "Math.ceil",
        ("Math", "round") => "Math.round",
        ("Math", "abs") => "Math.abs",
        ("Math", "min") => "Math.min",
        ("Math", "max") => "Math.max",
        ("Math", "pow") => "Math.pow",
        ("Math", "sqrt") => "Math.sqrt",
        ("Math", "trunc") => "Math.trunc",
        ("Math", "sign") => "Math.sign",
        ("Object", "keys") => "Object.keys",
        ("Object", "values") => "Object.values",
        ("Object", "entries") => "Object.entries",
        ("Object", "fromEntries") => "Object.fromEntries",
        ("Object", "assign") => "Object.assign",
        ("Array", "isArray") => "Array.isArray",
        ("Array", "of") => "Array.of",
        ("Array", "from") => "Array.from",
        ("JSON", "stringify") => "JSON.stringify",
        ("JSON", "parse") => "JSON.parse",
        ("Date", "now") => "Date.now",
        _ => return RtValue::Undefined,
    };
    RtValue::Native(native)
}

fn arg(args: &[RtValue], idx: usize) -> RtValue {
    args.get(idx).cloned().unwrap_or(RtValue::Undefined)
}

fn bound(receiver: &RtValue, name: &str) -> RtValue {
    RtValue::Method(std::rc::Rc::new(BoundMethod {
        receiver: receiver.clone(),
        name: name.to_string(),
    }))
}

fn as_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

/// Property lookup `object[key]`.
pub(crate) fn get_property(object: &RtValue, key: &str) -> EvalResult<RtValue> {
    let value = match object {
        RtValue::Undefined | RtValue::Null => {
            return Err(RuntimeError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.describe()
            ))
            .into())
        }
        RtValue::Str(s) => match key {
            "length" => RtValue::Int(s.chars().count() as i64),
            _ => match as_index(key) {
                Some(idx) => s.chars().nth(idx).map_or(RtValue::Undefined, |c| RtValue::str(c.to_string())),
                None if STRING_METHODS.contains(&key) => bound(object, key),
                None => RtValue::Undefined,
            },
        },
        RtValue::List(items) => match key {
            "length" => RtValue::Int(items.len() as i64),
            _ => match as_index(key) {
                Some(idx) => items.get(idx).cloned().unwrap_or(RtValue::Undefined),
                None if LIST_METHODS.contains(&key) => bound(object, key),
                None => RtValue::Undefined,
            },
        },
        RtValue::Map(map) => match map.get(key) {
            Some(value) => value.clone(),
            None if key == "hasOwnProperty" => bound(object, key),
            None => RtValue::Undefined,
        },
        RtValue::Date(_) | RtValue::DateTime(_) => match date_property(object, key) {
            Some(value) => value,
            None if DATE_METHODS.contains(&key) => bound(object, key),
            None => RtValue::Undefined,
        },
        RtValue::Int(_) | RtValue::Float(_) if NUMBER_METHODS.contains(&key) => bound(object, key),
        RtValue::Host(_) if key == "pages" || key == "page" => bound(object, key),
        RtValue::Namespace(namespace) => namespace_member(namespace, key),
        _ => RtValue::Undefined,
    };
    Ok(value)
}

/// The `in` operator.
pub(crate) fn has_property(object: &RtValue, key: &str) -> EvalResult<bool> {
    match object {
        RtValue::Map(map) => Ok(map.contains_key(key)),
        RtValue::List(items) => Ok(key == "length" || as_index(key).is_some_and(|i| i < items.len())),
        RtValue::Namespace(_) | RtValue::Host(_) | RtValue::Date(_) | RtValue::DateTime(_) => {
            Ok(!matches!(get_property(object, key)?, RtValue::Undefined))
        }
        other => Err(RuntimeError::type_error(format!(
            "Cannot use 'in' operator to search for '{key}' in {}",
            other.describe()
        ))
        .into()),
    }
}

// ============================================================================
// Global functions
// ============================================================================

pub(crate) fn call_native(interp: &mut Interpreter, name: &str, args: Vec<RtValue>) -> EvalResult<RtValue> {
    let first = arg(&args, 0);
    let value = match name {
        "String" => interp.new_str(if args.is_empty() { String::new() } else { interp.text_of(&first)? })?,
        "Number" => {
            if args.is_empty() {
                RtValue::Int(0)
            } else {
                first.to_number().into_value()
            }
        }
        "Boolean" => RtValue::Bool(first.is_truthy()),
        "parseInt" => parse_int(&interp.text_of(&first)?, &arg(&args, 1)),
        "parseFloat" => RtValue::Float(parse_float(&interp.text_of(&first)?)),
        "isNaN" => RtValue::Bool(first.to_number().is_nan()),
        "isFinite" => RtValue::Bool(first.to_number().to_f64().is_finite()),
        "date" => construct_date(interp, &args),
        "today" => RtValue::Date(interp.clock().date_naive()),
        "now" => RtValue::DateTime(interp.clock()),
        "Date.now" => RtValue::Int(interp.clock().timestamp_millis()),
        _ if name.starts_with("Math.") => math(&name[5..], &args),
        _ if name.starts_with("Object.") => object_fn(interp, &name[7..], &args)?,
        "Array.isArray" => RtValue::Bool(matches!(first, RtValue::List(_))),
        "Array.of" => interp.new_list(args)?,
        "Array.from" => {
            let items = iterate(&first).unwrap_or_default();
            let mapper = arg(&args, 1);
            if mapper.is_callable() {
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    out.push(interp.call(&mapper, vec![item, RtValue::Int(idx as i64)])?);
                }
                interp.new_list(out)?
            } else {
                interp.new_list(items)?
            }
        }
        "JSON.stringify" => json_stringify(interp, &first, &arg(&args, 2))?,
        "JSON.parse" => {
            let text = interp.text_of(&first)?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| RuntimeError::error(format!("JSON.parse: {e}")))?;
            interp.check_depth(RtValue::from_value(&Value::from_json(json)))?
        }
        other => return Err(RuntimeError::type_error(format!("{other} is not a function")).into()),
    };
    Ok(value)
}

/// Integral results become integers.
fn int_or_float(f: f64) -> RtValue {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE {
        RtValue::Int(f as i64)
    } else {
        RtValue::Float(f)
    }
}

fn math(name: &str, args: &[RtValue]) -> RtValue {
    let x = arg(args, 0).to_number();
    match name {
        "floor" => int_or_float(x.to_f64().floor()),
        "ceil" => int_or_float(x.to_f64().ceil()),
        "round" => int_or_float((x.to_f64() + 0.5).floor()),
        "trunc" => int_or_float(x.to_f64().trunc()),
        "abs" => match x {
            Num::Int(i) => i.checked_abs().map_or(RtValue::Float((i as f64).abs()), RtValue::Int),
            Num::Float(f) => RtValue::Float(f.abs()),
        },
        "sign" => {
            let f = x.to_f64();
            if f.is_nan() {
                RtValue::Float(f64::NAN)
            } else if f > 0.0 {
                RtValue::Int(1)
            } else if f < 0.0 {
                RtValue::Int(-1)
            } else {
                RtValue::Int(0)
            }
        }
        "sqrt" => int_or_float(x.to_f64().sqrt()),
        "pow" => arith_pow(x, arg(args, 1).to_number()).into_value(),
        "min" | "max" => {
            let nums: Vec<Num> = args.iter().map(RtValue::to_number).collect();
            if nums.iter().any(|n| n.is_nan()) {
                return RtValue::Float(f64::NAN);
            }
            let pick = nums.into_iter().reduce(|a, b| {
                let keep_a = if name == "min" { a.to_f64() <= b.to_f64() } else { a.to_f64() >= b.to_f64() };
                if keep_a {
                    a
                } else {
                    b
                }
            });
            match pick {
                Some(n) => n.into_value(),
                None if name == "min" => RtValue::Float(f64::INFINITY),
                None => RtValue::Float(f64::NEG_INFINITY),
            }
        }
        _ => RtValue::Undefined,
    }
}

pub(crate) fn arith_pow(base: Num, exp: Num) -> Num {
    if let (Num::Int(b), Num::Int(e)) = (base, exp) {
        if let Ok(e) = u32::try_from(e) {
            if let Some(result) = b.checked_pow(e) {
                return Num::Int(result);
            }
        }
    }
    Num::Float(base.to_f64().powf(exp.to_f64()))
}

fn object_fn(interp: &mut Interpreter, name: &str, args: &[RtValue]) -> EvalResult<RtValue> {
    let target = arg(args, 0);
    if target.is_nullish() && name != "fromEntries" {
        return Err(RuntimeError::type_error("Cannot convert undefined or null to object").into());
    }
    let value = match name {
        "keys" => interp.new_list(entries(&target).into_iter().map(|(k, _)| RtValue::str(k)).collect())?,
        "values" => interp.new_list(entries(&target).into_iter().map(|(_, v)| v).collect())?,
        "entries" => interp.new_list(
            entries(&target)
                .into_iter()
                .map(|(k, v)| RtValue::list(vec![RtValue::str(k), v]))
                .collect(),
        )?,
        "fromEntries" => {
            let Some(pairs) = iterate(&target) else {
                return Err(RuntimeError::type_error(format!("{} is not iterable", target.describe())).into());
            };
            let mut map = RtMap::new();
            for pair in pairs {
                let RtValue::List(kv) = &pair else {
                    return Err(RuntimeError::type_error(format!(
                        "Iterator value {} is not an entry object",
                        pair.snippet()
                    ))
                    .into());
                };
                let key = match kv.first() {
                    Some(key) => property_key(interp, key)?,
                    None => "undefined".into(),
                };
                map.insert(key, kv.get(1).cloned().unwrap_or(RtValue::Undefined));
            }
            interp.new_map(map)?
        }
        "assign" => {
            let mut map = RtMap::new();
            for source in args {
                for (k, v) in entries(source) {
                    map.insert(k, v);
                }
            }
            interp.new_map(map)?
        }
        _ => RtValue::Undefined,
    };
    Ok(value)
}

/// Own enumerable entries of a value, as `Object.entries` sees them.
pub(crate) fn entries(value: &RtValue) -> Vec<(String, RtValue)> {
    match value {
        RtValue::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        RtValue::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        RtValue::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), RtValue::str(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

/// Items produced by spreading `value`, or `None` if it is not iterable.
pub(crate) fn iterate(value: &RtValue) -> Option<Vec<RtValue>> {
    match value {
        RtValue::List(items) => Some(items.to_vec()),
        RtValue::Str(s) => Some(s.chars().map(|c| RtValue::str(c.to_string())).collect()),
        _ => None,
    }
}

/// Text of a computed property key.
pub(crate) fn property_key(interp: &Interpreter, value: &RtValue) -> EvalResult<String> {
    interp.text_of(value)
}

fn json_stringify(interp: &mut Interpreter, value: &RtValue, indent: &RtValue) -> EvalResult<RtValue> {
    interp.check_str_len(value.json_len())?;
    let Some(json) = value.to_json() else {
        return Ok(RtValue::Undefined);
    };
    let indent = match indent {
        RtValue::Int(_) | RtValue::Float(_) => " ".repeat(indent.to_number().to_f64().clamp(0.0, 10.0) as usize),
        RtValue::Str(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&json)
    } else {
        pretty_json(&json, &indent)
    }
    .map_err(|e| RuntimeError::error(format!("JSON.stringify: {e}")))?;
    interp.new_str(text)
}

fn pretty_json(json: &serde_json::Value, indent: &str) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn parse_int(text: &str, radix: &RtValue) -> RtValue {
    let trimmed = text.trim();
    let (negative, mut digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let mut radix = match radix.to_number().to_f64() {
        r if r.is_nan() || r == 0.0 => 10,
        r => r.trunc() as u32,
    };
    if !(2..=36).contains(&radix) {
        return RtValue::Float(f64::NAN);
    }
    if radix == 10 || radix == 16 {
        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            digits = hex;
            radix = 16;
        }
    }
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map_or(digits.len(), |(i, _)| i);
    let digits = &digits[..end];
    if digits.is_empty() {
        return RtValue::Float(f64::NAN);
    }
    let value = match i64::from_str_radix(digits, radix) {
        Ok(n) => Num::Int(n),
        Err(_) => Num::Float(
            digits
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d)),
        ),
    };
    match (value, negative) {
        (Num::Int(n), true) => RtValue::Int(-n),
        (Num::Float(f), true) => RtValue::Float(-f),
        (v, false) => v.into_value(),
    }
}

fn parse_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if trimmed[end..].starts_with("Infinity") {
        return if trimmed.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || (end == digits_start + 1 && bytes[digits_start] == b'.') {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    trimmed[..end].parse().unwrap_or(f64::NAN)
}

// ============================================================================
// Dates
// ============================================================================

/// `date(x)` / `new Date(x)`. Unparseable input yields `null`.
pub(crate) fn construct_date(interp: &Interpreter, args: &[RtValue]) -> RtValue {
    let clock = interp.clock();
    match args {
        [] => RtValue::DateTime(clock),
        [RtValue::Int(_) | RtValue::Float(_), RtValue::Int(_) | RtValue::Float(_), ..] => {
            let part = |i: usize| arg(args, i).to_number().to_f64();
            let day = if args.len() > 2 { part(2) } else { 1.0 };
            NaiveDate::from_ymd_opt(part(0) as i32, (part(1) as i64 + 1) as u32, day as u32)
                .map_or(RtValue::Null, RtValue::Date)
        }
        [single, ..] => match single {
            RtValue::Date(_) | RtValue::DateTime(_) => single.clone(),
            RtValue::Int(_) | RtValue::Float(_) => {
                let millis = single.to_number().to_f64();
                if !millis.is_finite() {
                    return RtValue::Null;
                }
                Utc.timestamp_millis_opt(millis as i64)
                    .single()
                    .map_or(RtValue::Null, |dt| RtValue::DateTime(dt.fixed_offset()))
            }
            RtValue::Str(s) => parse_date(s, clock).unwrap_or(RtValue::Null),
            _ => RtValue::Null,
        },
    }
}

fn parse_date(text: &str, clock: DateTime<FixedOffset>) -> Option<RtValue> {
    let text = text.trim();
    match text {
        "today" => return Some(RtValue::Date(clock.date_naive())),
        "now" => return Some(RtValue::DateTime(clock)),
        "yesterday" => return clock.date_naive().pred_opt().map(RtValue::Date),
        "tomorrow" => return clock.date_naive().succ_opt().map(RtValue::Date),
        _ => {}
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(RtValue::Date(d));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(RtValue::DateTime(dt));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return clock
                .offset()
                .from_local_datetime(&naive)
                .single()
                .map(RtValue::DateTime);
        }
    }
    None
}

fn date_parts(value: &RtValue) -> Option<NaiveDateTime> {
    match value {
        RtValue::Date(d) => d.and_hms_opt(0, 0, 0),
        RtValue::DateTime(dt) => Some(dt.naive_local()),
        _ => None,
    }
}

fn date_property(value: &RtValue, key: &str) -> Option<RtValue> {
    let dt = date_parts(value)?;
    let n = match key {
        "year" => dt.year() as i64,
        "month" => dt.month() as i64,
        "day" => dt.day() as i64,
        "hour" => dt.hour() as i64,
        "minute" => dt.minute() as i64,
        "second" => dt.second() as i64,
        "weekday" => dt.weekday().number_from_monday() as i64,
        _ => return None,
    };
    Some(RtValue::Int(n))
}

fn date_method(interp: &mut Interpreter, value: &RtValue, name: &str, args: &[RtValue]) -> EvalResult<RtValue> {
    let Some(dt) = date_parts(value) else {
        return Ok(RtValue::Undefined);
    };
    let result = match name {
        "toISOString" => {
            let utc = match value {
                RtValue::DateTime(dt) => dt.with_timezone(&Utc).naive_utc(),
                _ => dt,
            };
            RtValue::str(utc.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        }
        "toISODate" => RtValue::str(dt.format("%Y-%m-%d").to_string()),
        "toString" => RtValue::str(value.date_text().unwrap_or_default()),
        "toFormat" => interp.new_str(luxon_format(&dt, &interp.text_of(&arg(args, 0))?))?,
        "getFullYear" => RtValue::Int(dt.year() as i64),
        "getMonth" => RtValue::Int(dt.month0() as i64),
        "getDate" => RtValue::Int(dt.day() as i64),
        "getDay" => RtValue::Int(dt.weekday().num_days_from_sunday() as i64),
        "getTime" => value.to_number().into_value(),
        _ => RtValue::Undefined,
    };
    Ok(result)
}

/// Subset of Luxon format tokens. Text in single quotes is copied as is.
fn luxon_format(dt: &NaiveDateTime, pattern: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("yy", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("dd", "%d"),
        ("d", "%-d"),
        ("EEEE", "%A"),
        ("EEE", "%a"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("a", "%p"),
    ];
    let mut strftime = String::new();
    let mut rest = pattern;
    while let Some(ch) = rest.chars().next() {
        if ch == '\'' {
            let quoted = &rest[1..];
            let end = quoted.find('\'').unwrap_or(quoted.len());
            strftime.push_str(&quoted[..end].replace('%', "%%"));
            rest = quoted.get(end + 1..).unwrap_or("");
            continue;
        }
        if let Some((token, directive)) = TOKENS.iter().find(|(token, _)| rest.starts_with(token)) {
            strftime.push_str(directive);
            rest = &rest[token.len()..];
            continue;
        }
        if ch == '%' {
            strftime.push_str("%%");
        } else {
            strftime.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }
    dt.format(&strftime).to_string()
}

// ============================================================================
// Methods
// ============================================================================

pub(crate) fn call_method(
    interp: &mut Interpreter,
    receiver: &RtValue,
    name: &str,
    args: Vec<RtValue>,
) -> EvalResult<RtValue> {
    match receiver {
        RtValue::Str(s) => string_method(interp, s, name, &args),
        RtValue::List(items) => list_method(interp, receiver, items, name, args),
        RtValue::Map(map) => Ok(RtValue::Bool(
            name == "hasOwnProperty" && map.contains_key(&property_key(interp, &arg(&args, 0))?),
        )),
        RtValue::Date(_) | RtValue::DateTime(_) => date_method(interp, receiver, name, &args),
        RtValue::Int(_) | RtValue::Float(_) => number_method(interp, receiver, name, &args),
        RtValue::Host(api) => {
            let value = match name {
                "pages" => {
                    let source = arg(&args, 0);
                    let source = if source.is_nullish() { None } else { Some(interp.text_of(&source)?) };
                    let pages = api.pages(source.as_deref());
                    interp.new_list(pages.iter().map(RtValue::from_value).collect())?
                }
                "page" => api
                    .page(&interp.text_of(&arg(&args, 0))?)
                    .map_or(RtValue::Undefined, |page| RtValue::from_value(&page)),
                _ => RtValue::Undefined,
            };
            Ok(value)
        }
        other => Err(RuntimeError::type_error(format!("{}.{name} is not a function", other.describe())).into()),
    }
}

fn number_method(interp: &mut Interpreter, value: &RtValue, name: &str, args: &[RtValue]) -> EvalResult<RtValue> {
    match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number().to_f64();
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(RuntimeError::range_error("toFixed() digits argument must be between 0 and 100").into());
            }
            let f = value.to_number().to_f64();
            interp.new_str(format!("{:.*}", digits as usize, f))
        }
        _ => interp.new_str(value.to_js_string()),
    }
}

/// Resolve a relative index the way `slice` does.
fn relative_index(value: &RtValue, len: usize, default: usize) -> usize {
    if matches!(value, RtValue::Undefined) {
        return default;
    }
    let n = value.to_number().to_f64();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn char_slice(s: &str, start: usize, end: usize) -> String {
    if end <= start {
        return String::new();
    }
    s.chars().skip(start).take(end - start).collect()
}

fn char_index_of(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_from = haystack.char_indices().nth(from).map_or(haystack.len(), |(i, _)| i);
    haystack[byte_from..]
        .find(needle)
        .map(|byte| from + haystack[byte_from..byte_from + byte].chars().count())
}

fn string_method(interp: &mut Interpreter, s: &str, name: &str, args: &[RtValue]) -> EvalResult<RtValue> {
    let len = s.chars().count();
    let first = arg(args, 0);
    let value = match name {
        "toUpperCase" => RtValue::str(s.to_uppercase()),
        "toLowerCase" => RtValue::str(s.to_lowercase()),
        "trim" => RtValue::str(s.trim()),
        "trimStart" => RtValue::str(s.trim_start()),
        "trimEnd" => RtValue::str(s.trim_end()),
        "toString" => RtValue::str(s),
        "split" => {
            let limit = match arg(args, 1) {
                RtValue::Undefined => usize::MAX,
                other => other.to_number().to_f64().max(0.0) as usize,
            };
            let parts: Vec<RtValue> = match &first {
                RtValue::Undefined => vec![RtValue::str(s)],
                sep => {
                    let sep = interp.text_of(sep)?;
                    if sep.is_empty() {
                        s.chars().map(|c| RtValue::str(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(RtValue::str).collect()
                    }
                }
            };
            interp.new_list(parts.into_iter().take(limit).collect())?
        }
        "replace" | "replaceAll" => {
            let pattern = interp.text_of(&first)?;
            let replacement = arg(args, 1);
            let mut out = String::with_capacity(s.len());
            let mut rest = s;
            let mut offset = 0;
            let mut replaced = false;
            while let Some(pos) = (!replaced || name == "replaceAll")
                .then(|| rest.find(pattern.as_str()))
                .flatten()
            {
                out.push_str(&rest[..pos]);
                let with = if replacement.is_callable() {
                    let at = offset + rest[..pos].chars().count();
                    let result =
                        interp.call(&replacement, vec![RtValue::str(&pattern), RtValue::Int(at as i64), RtValue::str(s)])?;
                    interp.text_of(&result)?
                } else {
                    interp.text_of(&replacement)?
                };
                out.push_str(&with);
                interp.check_str_len(out.len())?;
                replaced = true;
                let advance = if pattern.is_empty() {
                    // Empty patterns match between every character.
                    match rest[pos..].chars().next() {
                        Some(c) => {
                            out.push(c);
                            pos + c.len_utf8()
                        }
                        None => {
                            rest = "";
                            break;
                        }
                    }
                } else {
                    pos + pattern.len()
                };
                offset += rest[..advance].chars().count();
                rest = &rest[advance..];
            }
            out.push_str(rest);
            interp.new_str(out)?
        }
        "startsWith" => {
            let from = relative_index(&arg(args, 1), len, 0);
            RtValue::Bool(char_slice(s, from, len).starts_with(interp.text_of(&first)?.as_str()))
        }
        "endsWith" => {
            let end = relative_index(&arg(args, 1), len, len);
            RtValue::Bool(char_slice(s, 0, end).ends_with(interp.text_of(&first)?.as_str()))
        }
        "includes" => RtValue::Bool(s.contains(interp.text_of(&first)?.as_str())),
        "indexOf" => {
            let from = relative_index(&arg(args, 1), len, 0);
            RtValue::Int(char_index_of(s, &interp.text_of(&first)?, from).map_or(-1, |i| i as i64))
        }
        "slice" => {
            let start = relative_index(&first, len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            RtValue::str(char_slice(s, start, end))
        }
        "substring" => {
            let clamp = |v: &RtValue, default: usize| match v {
                RtValue::Undefined => default,
                v => {
                    let n = v.to_number().to_f64();
                    if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize }
                }
            };
            let a = clamp(&first, 0);
            let b = clamp(&arg(args, 1), len);
            RtValue::str(char_slice(s, a.min(b), a.max(b)))
        }
        "padStart" | "padEnd" => {
            let target = first.to_number().to_f64();
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            interp.check_str_len(target)?;
            let fill = match arg(args, 1) {
                RtValue::Undefined => " ".to_string(),
                other => interp.text_of(&other)?,
            };
            if target <= len || fill.is_empty() {
                RtValue::str(s)
            } else {
                // The target counts characters and the limit counts bytes.
                let widest = fill.chars().map(char::len_utf8).max().unwrap_or(1);
                interp.check_str_len(s.len().saturating_add((target - len).saturating_mul(widest)))?;
                let pad: String = fill.chars().cycle().take(target - len).collect();
                if name == "padStart" {
                    interp.new_str(format!("{pad}{s}"))?
                } else {
                    interp.new_str(format!("{s}{pad}"))?
                }
            }
        }
        "repeat" => {
            let count = first.to_number().to_f64();
            if count < 0.0 || count.is_infinite() {
                return Err(RuntimeError::range_error(format!("Invalid count value: {}", number_to_string(count))).into());
            }
            let count = if count.is_nan() { 0 } else { count as usize };
            interp.check_str_len(s.len().saturating_mul(count))?;
            RtValue::str(s.repeat(count))
        }
        "at" => {
            let idx = first.to_number().to_f64();
            let idx = if idx.is_nan() { 0 } else { idx.trunc() as i64 };
            let idx = if idx < 0 { len as i64 + idx } else { idx };
            usize::try_from(idx)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map_or(RtValue::Undefined, |c| RtValue::str(c.to_string()))
        }
        "concat" => {
            let mut out = s.to_string();
            for a in args {
                interp.check_str_len(out.len().saturating_add(a.text_len()))?;
                out.push_str(&a.to_js_string());
            }
            interp.new_str(out)?
        }
        _ => RtValue::Undefined,
    };
    Ok(value)
}

fn ordering_from(result: &RtValue) -> Ordering {
    let n = result.to_number().to_f64();
    if n < 0.0 {
        Ordering::Less
    } else if n > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Default `sort` order: by string form. Strings are compared in place;
/// the text of nested lists counts against the string limit as a whole.
fn sort_by_text(interp: &Interpreter, items: Vec<RtValue>) -> EvalResult<Vec<RtValue>> {
    let mut list_text = 0usize;
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let key: Option<String> = match &item {
            RtValue::Str(_) => None,
            RtValue::List(_) => {
                let text = interp.text_of(&item)?;
                list_text = list_text.saturating_add(text.len());
                interp.check_str_len(list_text)?;
                Some(text)
            }
            other => Some(other.to_js_string()),
        };
        keyed.push((key, item));
    }
    fn text<'a>((key, item): &'a (Option<String>, RtValue)) -> &'a str {
        match (key, item) {
            (Some(key), _) => key.as_str(),
            (None, RtValue::Str(s)) => &**s,
            (None, _) => "",
        }
    }
    keyed.sort_by(|a, b| text(a).cmp(text(b)));
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn flatten_into(out: &mut Vec<RtValue>, items: &[RtValue], depth: usize) {
    for item in items {
        match item {
            RtValue::List(inner) if depth > 0 => flatten_into(out, inner, depth - 1),
            other => out.push(other.clone()),
        }
    }
}

fn list_method(
    interp: &mut Interpreter,
    receiver: &RtValue,
    items: &[RtValue],
    name: &str,
    args: Vec<RtValue>,
) -> EvalResult<RtValue> {
    let len = items.len();
    let first = arg(&args, 0);
    let needs_callback = matches!(
        name,
        "map" | "filter" | "find" | "findIndex" | "some" | "every" | "reduce"
    );
    if needs_callback && !first.is_callable() {
        return Err(RuntimeError::type_error(format!("{} is not a function", first.snippet())).into());
    }
    let callback_args = |item: &RtValue, idx: usize| vec![item.clone(), RtValue::Int(idx as i64), receiver.clone()];

    let value = match name {
        "map" => {
            let mut out = Vec::with_capacity(len);
            for (idx, item) in items.iter().enumerate() {
                out.push(interp.call(&first, callback_args(item, idx))?);
            }
            interp.new_list(out)?
        }
        "filter" => {
            let mut out = Vec::new();
            for (idx, item) in items.iter().enumerate() {
                if interp.call(&first, callback_args(item, idx))?.is_truthy() {
                    out.push(item.clone());
                }
            }
            interp.new_list(out)?
        }
        "find" | "findIndex" => {
            let mut found = None;
            for (idx, item) in items.iter().enumerate() {
                if interp.call(&first, callback_args(item, idx))?.is_truthy() {
                    found = Some((idx, item.clone()));
                    break;
                }
            }
            match (name, found) {
                ("find", Some((_, item))) => item,
                ("find", None) => RtValue::Undefined,
                (_, Some((idx, _))) => RtValue::Int(idx as i64),
                (_, None) => RtValue::Int(-1),
            }
        }
        "some" | "every" => {
            let want = name == "some";
            let mut result = !want;
            for (idx, item) in items.iter().enumerate() {
                if interp.call(&first, callback_args(item, idx))?.is_truthy() == want {
                    result = want;
                    break;
                }
            }
            RtValue::Bool(result)
        }
        "reduce" => {
            let mut iter = items.iter().enumerate();
            let mut acc = if args.len() > 1 {
                arg(&args, 1)
            } else {
                match iter.next() {
                    Some((_, item)) => item.clone(),
                    None => {
                        return Err(RuntimeError::type_error("Reduce of empty array with no initial value").into())
                    }
                }
            };
            for (idx, item) in iter {
                acc = interp.call(&first, vec![acc, item.clone(), RtValue::Int(idx as i64), receiver.clone()])?;
            }
            acc
        }
        "includes" => RtValue::Bool(items.iter().any(|item| item.same_value_zero(&first))),
        "indexOf" => RtValue::Int(
            items
                .iter()
                .position(|item| item.strict_eq(&first))
                .map_or(-1, |i| i as i64),
        ),
        "join" => {
            let sep = match &first {
                RtValue::Undefined => ",".to_string(),
                other => interp.text_of(other)?,
            };
            let joined_len = items
                .iter()
                .map(|item| if item.is_nullish() { 0 } else { item.text_len() })
                .fold(sep.len().saturating_mul(len.saturating_sub(1)), usize::saturating_add);
            interp.check_str_len(joined_len)?;
            let text = items
                .iter()
                .map(|item| if item.is_nullish() { String::new() } else { item.to_js_string() })
                .collect::<Vec<_>>()
                .join(&sep);
            interp.new_str(text)?
        }
        "slice" => {
            let start = relative_index(&first, len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            RtValue::list(if end > start { items[start..end].to_vec() } else { Vec::new() })
        }
        "concat" => {
            let mut out = items.to_vec();
            for a in &args {
                match a {
                    RtValue::List(inner) => out.extend(inner.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            interp.new_list(out)?
        }
        "flat" => {
            let depth = match &first {
                RtValue::Undefined => 1,
                other => other.to_number().to_f64().max(0.0).min(64.0) as usize,
            };
            let mut out = Vec::new();
            flatten_into(&mut out, items, depth);
            interp.new_list(out)?
        }
        "reverse" => RtValue::list(items.iter().rev().cloned().collect()),
        "sort" => {
            let (mut defined, undefined): (Vec<RtValue>, Vec<RtValue>) = items
                .iter()
                .cloned()
                .partition(|item| !matches!(item, RtValue::Undefined));
            if first.is_callable() {
                let mut failure = None;
                defined.sort_by(|a, b| {
                    if failure.is_some() {
                        return Ordering::Equal;
                    }
                    match interp.call(&first, vec![a.clone(), b.clone()]) {
                        Ok(result) => ordering_from(&result),
                        Err(err) => {
                            failure = Some(err);
                            Ordering::Equal
                        }
                    }
                });
                if let Some(err) = failure {
                    return Err(err);
                }
            } else {
                defined = sort_by_text(interp, defined)?;
            }
            defined.extend(undefined);
            RtValue::list(defined)
        }
        "at" => {
            let idx = first.to_number().to_f64();
            let idx = if idx.is_nan() { 0 } else { idx.trunc() as i64 };
            let idx = if idx < 0 { len as i64 + idx } else { idx };
            usize::try_from(idx)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(RtValue::Undefined)
        }
        _ => RtValue::Undefined,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("42", 10.0, Some(42) ; "decimal")]
    #[test_case("  -17px", 10.0, Some(-17) ; "prefix with sign")]
    #[test_case("0x1f", 10.0, Some(31) ; "hex prefix")]
    #[test_case("101", 2.0, Some(5) ; "binary")]
    #[test_case("abc", 10.0, None ; "not a number")]
    fn test_parse_int(text: &str, radix: f64, expected: Option<i64>) {
        match (parse_int(text, &RtValue::Float(radix)), expected) {
            (RtValue::Int(n), Some(e)) => assert_eq!(n, e),
            (RtValue::Float(f), None) => assert!(f.is_nan()),
            (other, _) => panic!("unexpected {other:?}"),
        }
    }

    #[test_case("3.5kg", 3.5)]
    #[test_case("  -2e3", -2000.0)]
    #[test_case(".25", 0.25)]
    #[test_case("1e", 1.0)]
    fn test_parse_float(text: &str, expected: f64) {
        assert_eq!(parse_float(text), expected);
    }

    #[test]
    fn test_parse_float_rejects() {
        assert!(parse_float("abc").is_nan());
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn test_luxon_format() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(luxon_format(&dt, "yyyy-MM-dd"), "2024-03-09");
        assert_eq!(luxon_format(&dt, "d MMM yy, HH:mm"), "9 Mar 24, 14:05");
        assert_eq!(luxon_format(&dt, "'Week of' yyyy"), "Week of 2024");
    }

    #[test]
    fn test_math_min_max_keep_integers() {
        assert!(matches!(math("max", &[RtValue::Int(1), RtValue::Int(3)]), RtValue::Int(3)));
        assert!(matches!(math("min", &[]), RtValue::Float(f) if f.is_infinite()));
        assert!(matches!(math("round", &[RtValue::Float(2.5)]), RtValue::Int(3)));
        assert!(matches!(math("round", &[RtValue::Float(-2.5)]), RtValue::Int(-2)));
    }

    #[test]
    fn test_property_of_null_is_type_error() {
        let err = get_property(&RtValue::Null, "x").unwrap_err();
        assert!(err.to_string().contains("Cannot read properties of null (reading 'x')"));
    }

    #[test]
    fn test_index_keys() {
        assert_eq!(as_index("0"), Some(0));
        assert_eq!(as_index("12"), Some(12));
        assert_eq!(as_index("01"), None);
        assert_eq!(as_index("-1"), None);
    }
}
