//! Cell text ↔ typed values.
//!
//! Primitive columns parse with invariant rules and fall back to the zero
//! value on garbage. Everything else goes through the column's mapping. Array
//! columns hold comma-separated elements, each converted on its own.

use std::str::FromStr;

use crate::error::MappingError;
use crate::mapping::Mapping;
use crate::schema::Column;
use crate::value::{Value, ValueType};

/// Characters stripped from both ends of every cell and array element.
pub const TRIM_CHARS: &[char] = &[' ', '\r', '\n'];

pub fn trim_cell(text: &str) -> &str {
    text.trim_matches(TRIM_CHARS)
}

/// A decoded cell. `valid` is false when a mapping rejected the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub valid: bool,
}

/// An encoded cell and how many values in it were written as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub text: String,
    pub empty_cells: usize,
}

/// Decode one cell for `column`. A blank array cell decodes to an empty array.
pub fn to_typed(
    text: &str,
    column: &Column,
    mapping: Option<&Mapping>,
) -> Result<Decoded, MappingError> {
    if !column.is_array {
        return decode_scalar(text, column, mapping);
    }
    if trim_cell(text).is_empty() {
        return Ok(Decoded { value: Value::Array(Vec::new()), valid: true });
    }

    let mut valid = true;
    let mut items = Vec::new();
    for element in text.split(',') {
        let decoded = decode_scalar(element, column, mapping)?;
        valid &= decoded.valid;
        items.push(decoded.value);
    }
    Ok(Decoded { value: Value::Array(items), valid })
}

fn decode_scalar(
    text: &str,
    column: &Column,
    mapping: Option<&Mapping>,
) -> Result<Decoded, MappingError> {
    let text = trim_cell(text);
    if column.is_primitive {
        return Ok(Decoded { value: parse_primitive(text, column.value_type), valid: true });
    }
    match mapping {
        Some(mapping) => {
            let value = mapping.resolve(text)?;
            let valid = mapping.validate(&value);
            Ok(Decoded { value, valid })
        }
        // Reported once per column by the caller
        None => Ok(Decoded { value: Value::Empty, valid: true }),
    }
}

/// Parse already-trimmed text as a primitive. Unparseable text gives zero,
/// `false` or the empty string.
pub fn parse_primitive(text: &str, value_type: ValueType) -> Value {
    match value_type {
        ValueType::Int => Value::Int(parse_integer(text).unwrap_or(0)),
        ValueType::Long => Value::Long(parse_integer(text).unwrap_or(0)),
        ValueType::Float => Value::Float(normalize_number(text).parse().unwrap_or(0.0)),
        ValueType::Double => Value::Double(normalize_number(text).parse().unwrap_or(0.0)),
        ValueType::Bool => Value::Bool(text.eq_ignore_ascii_case("true")),
        ValueType::Text => Value::Text(text.to_string()),
        ValueType::Enum | ValueType::Item | ValueType::Object => Value::Empty,
    }
}

/// Strip a leading `+` and thousands separators.
fn normalize_number(text: &str) -> String {
    text.strip_prefix('+').unwrap_or(text).replace(',', "")
}

/// Integers also accept integral decimals and exponents (`"5.0"`, `"1e3"`).
fn parse_integer<T: FromStr + TryFrom<i64>>(text: &str) -> Option<T> {
    let normalized = normalize_number(text);
    if let Ok(v) = normalized.parse::<T>() {
        return Some(v);
    }
    let f: f64 = normalized.parse().ok()?;
    if !f.is_finite() || f.fract() != 0.0 || f < i64::MIN as f64 || f > i64::MAX as f64 {
        return None;
    }
    T::try_from(f as i64).ok()
}

/// Encode `value` as cell text for `column`.
pub fn to_text(value: &Value, column: &Column, mapping: Option<&Mapping>) -> Encoded {
    if !column.is_array {
        let (text, missed) = encode_scalar(value, column, mapping);
        return Encoded { text, empty_cells: usize::from(missed) };
    }

    let items: &[Value] = match value {
        Value::Array(items) => items,
        Value::Empty => &[],
        other => std::slice::from_ref(other),
    };
    let mut empty_cells = 0;
    let parts: Vec<String> = items
        .iter()
        .map(|item| {
            let (text, missed) = encode_scalar(item, column, mapping);
            empty_cells += usize::from(missed);
            text
        })
        .collect();
    Encoded { text: parts.join(","), empty_cells }
}

fn encode_scalar(value: &Value, column: &Column, mapping: Option<&Mapping>) -> (String, bool) {
    if column.is_primitive {
        return (value.to_string(), false);
    }
    let Some(mapping) = mapping else {
        return (String::new(), true);
    };
    if value.is_empty() {
        return (String::new(), true);
    }
    if !mapping.validate(value) {
        log::warn!("Value '{}' of column '{}' not found in mapping, writing empty value", value, column.name);
        return (String::new(), true);
    }
    let key = mapping.key_of(value);
    let missed = key.is_empty();
    (key, missed)
}
