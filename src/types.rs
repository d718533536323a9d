use std::fmt;
use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// A single bound parameter value.
///
/// The protocol collaborator decides how each variant goes on the wire; the crate only
/// needs to store, snapshot and render them:
/// ```rust
/// use sql_prepared::prelude::*;
///
/// let params = vec![
///     ParameterValue::Int(1),
///     ParameterValue::Text("alice".into()),
///     ParameterValue::Null,
/// ];
/// assert_eq!(params[1].to_string(), "'alice'");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value, sent as text
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// Large binary payload that is streamed to the server. Binding one marks the
    /// statement as carrying long data for bulk batch execution.
    Stream(Vec<u8>),
}

impl ParameterValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `true` for values that must be streamed rather than inlined.
    #[must_use]
    pub fn is_long_data(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Append this value as a SQL literal.
    ///
    /// With `no_backslash_escapes` the server treats `\` as an ordinary character, so only
    /// quotes are doubled. Binary payloads are written as hex literals (`X'ff00'`).
    pub fn write_sql(&self, out: &mut String, no_backslash_escapes: bool) {
        match self {
            ParameterValue::Int(value) => {
                let _ = write!(out, "{value}");
            }
            ParameterValue::Float(value) if value.is_finite() => {
                let _ = write!(out, "{value:?}");
            }
            // NaN and the infinities have no SQL literal.
            ParameterValue::Float(_) => out.push_str("NULL"),
            ParameterValue::Bool(value) => out.push(if *value { '1' } else { '0' }),
            ParameterValue::Null => out.push_str("NULL"),
            ParameterValue::Text(value) => write_quoted(out, value, no_backslash_escapes),
            ParameterValue::Timestamp(value) => {
                let _ = write!(out, "'{}'", value.format("%Y-%m-%d %H:%M:%S%.f"));
            }
            ParameterValue::JSON(value) => {
                write_quoted(out, &value.to_string(), no_backslash_escapes);
            }
            ParameterValue::Blob(bytes) | ParameterValue::Stream(bytes) => write_hex(out, bytes),
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let ParameterValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let ParameterValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

fn write_hex(out: &mut String, bytes: &[u8]) {
    out.reserve(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out.push('\'');
}

fn write_quoted(out: &mut String, value: &str, no_backslash_escapes: bool) {
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' if !no_backslash_escapes => out.push_str("\\\\"),
            '\0' if !no_backslash_escapes => out.push_str("\\0"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Stream(bytes) => write!(f, "<stream of {} bytes>", bytes.len()),
            ParameterValue::Float(value) if !value.is_finite() => write!(f, "{value}"),
            _ => {
                let mut out = String::new();
                self.write_sql(&mut out, false);
                f.write_str(&out)
            }
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Int(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Int(i64::from(value))
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_owned())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

impl From<NaiveDateTime> for ParameterValue {
    fn from(value: NaiveDateTime) -> Self {
        ParameterValue::Timestamp(value)
    }
}

impl From<JsonValue> for ParameterValue {
    fn from(value: JsonValue) -> Self {
        ParameterValue::JSON(value)
    }
}

impl<T: Into<ParameterValue>> From<Option<T>> for ParameterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParameterValue::Null, Into::into)
    }
}

/// A frozen, fully bound parameter set: one execution's worth of values.
///
/// Produced from the slot table by `execute` and `add_batch`; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet(Box<[ParameterValue]>);

impl ParameterSet {
    pub(crate) fn new(values: Vec<ParameterValue>) -> Self {
        Self(values.into_boxed_slice())
    }

    #[must_use]
    pub fn values(&self) -> &[ParameterValue] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::Deref for ParameterSet {
    type Target = [ParameterValue];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
