//! Dynamically shaped parameter values.
//!
//! A [`Value`] is what flows from the parameter layers into the template
//! engine. Generated command code converts its typed parameter records to and
//! from values with [`FromValue`] and the `From` impls below.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Content of a file parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    pub path: String,
    pub content: String,
}

impl FileData {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    #[serde(skip_deserializing)]
    Date(DateTime<Utc>),
    #[serde(skip_deserializing)]
    File(FileData),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Template truthiness: zero values are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Date(d) => *d != DateTime::<Utc>::default(),
            Value::File(f) => !f.path.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Object(m) => !m.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::File(_) => "file",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by comparisons; integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Length of strings, lists and objects.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.len()),
            Value::Object(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Field lookup for objects and files.
    pub fn field(&self, name: &str) -> Result<Value, String> {
        match self {
            Value::Object(m) => m
                .get(name)
                .cloned()
                .ok_or_else(|| format!("map has no entry for key \"{}\"", name)),
            Value::File(f) => match name {
                "path" | "Path" => Ok(Value::String(f.path.clone())),
                "content" | "Content" => Ok(Value::String(f.content.clone())),
                _ => Err(format!("can't evaluate field {} in type file", name)),
            },
            Value::Null => Err(format!("nil data; no entry for key \"{}\"", name)),
            other => Err(format!(
                "can't evaluate field {} in type {}",
                name,
                other.type_name()
            )),
        }
    }

    /// Items iterated by `range`: list elements or object values in key order.
    pub fn items(&self) -> Result<Vec<(Value, Value)>, String> {
        match self {
            Value::List(l) => Ok(l
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Integer(i as i64), v.clone()))
                .collect()),
            Value::Object(m) => Ok(m
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect()),
            Value::Null => Ok(Vec::new()),
            Value::Integer(n) if *n >= 0 => Ok((0..*n)
                .map(|i| (Value::Integer(i), Value::Integer(i)))
                .collect()),
            other => Err(format!("range can't iterate over {}", other.type_name())),
        }
    }
}

/// Formats dates the way SQL literals expect them.
pub fn format_date(d: &DateTime<Utc>) -> String {
    d.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(d.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => f.write_str(&format_date(d)),
            Value::File(file) => f.write_str(&file.content),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Conversion from a [`Value`] into a concrete Rust type.
///
/// `Null` converts to the type's zero value so that unset parameters behave
/// the same in generated code as in the interpreted path.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {}, got {}", expected, value.type_name())
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(0),
            Value::Integer(n) => Ok(*n),
            Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            other => Err(mismatch("integer", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(0.0),
            other => other.as_f64().ok_or_else(|| mismatch("float", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(DateTime::<Utc>::default()),
            Value::Date(d) => Ok(*d),
            Value::String(s) => parse_date(s).ok_or_else(|| format!("invalid date '{}'", s)),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromValue for FileData {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(FileData::default()),
            Value::File(f) => Ok(f.clone()),
            other => Err(mismatch("file", other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::List(items) => items.iter().map(T::from_value).collect(),
            other => Err(mismatch("list", other)),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(BTreeMap::new()),
            Value::Object(m) => m
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_value(v)?)))
                .collect(),
            other => Err(mismatch("object", other)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<FileData> for Value {
    fn from(v: FileData) -> Self {
        Value::File(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Value::Object(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(10).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(!Value::Date(DateTime::<Utc>::default()).is_truthy());
        assert!(Value::Date(parse_date("2024-01-02").unwrap()).is_truthy());
    }

    #[test]
    fn test_display_list() {
        let v: Value = vec!["a", "b"].into();
        assert_eq!(v.to_string(), "[a b]");
    }

    #[test]
    fn test_parse_date_formats() {
        let d = parse_date("2024-03-01").unwrap();
        assert_eq!(format_date(&d), "2024-03-01 00:00:00");
        let d = parse_date("2024-03-01T10:20:30Z").unwrap();
        assert_eq!(format_date(&d), "2024-03-01 10:20:30");
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_from_value_null_is_zero() {
        assert_eq!(i64::from_value(&Value::Null).unwrap(), 0);
        assert_eq!(Vec::<String>::from_value(&Value::Null).unwrap(), Vec::<String>::new());
        assert!(String::from_value(&Value::Integer(3)).is_err());
    }

    #[test]
    fn test_file_fields() {
        let f = Value::File(FileData::new("a.sql", "SELECT 1"));
        assert_eq!(f.field("path").unwrap(), Value::from("a.sql"));
        assert_eq!(f.field("content").unwrap(), Value::from("SELECT 1"));
        assert!(f.field("size").is_err());
    }

    #[test]
    fn test_deserialize_untagged() {
        let v: Value = serde_yaml::from_str("[1, 2.5, \"x\", true, ~]").unwrap();
        assert_eq!(
            v,
            Value::List(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::String("x".into()),
                Value::Bool(true),
                Value::Null,
            ])
        );
    }
}
