//! Typed parameter definitions and resolved parameter values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use crate::error::{SqlCraftError, SqlCraftResult};
use crate::value::{FileData, FromValue, Value, parse_date};

/// The declared kind of a parameter.
///
/// Kinds not in this list are kept verbatim as [`ParameterKind::Unknown`]
/// instead of failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParameterKind {
    String,
    StringList,
    StringFromFile,
    StringFromFiles,
    StringListFromFile,
    StringListFromFiles,
    Integer,
    IntegerList,
    Float,
    FloatList,
    Bool,
    Date,
    Choice,
    ChoiceList,
    File,
    FileList,
    ObjectFromFile,
    ObjectListFromFile,
    ObjectListFromFiles,
    KeyValue,
    Unknown(String),
}

impl ParameterKind {
    /// Every known kind, in documentation order.
    pub const KNOWN: [ParameterKind; 20] = [
        ParameterKind::String,
        ParameterKind::StringList,
        ParameterKind::StringFromFile,
        ParameterKind::StringFromFiles,
        ParameterKind::StringListFromFile,
        ParameterKind::StringListFromFiles,
        ParameterKind::Integer,
        ParameterKind::IntegerList,
        ParameterKind::Float,
        ParameterKind::FloatList,
        ParameterKind::Bool,
        ParameterKind::Date,
        ParameterKind::Choice,
        ParameterKind::ChoiceList,
        ParameterKind::File,
        ParameterKind::FileList,
        ParameterKind::ObjectFromFile,
        ParameterKind::ObjectListFromFile,
        ParameterKind::ObjectListFromFiles,
        ParameterKind::KeyValue,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::StringList => "stringList",
            ParameterKind::StringFromFile => "stringFromFile",
            ParameterKind::StringFromFiles => "stringFromFiles",
            ParameterKind::StringListFromFile => "stringListFromFile",
            ParameterKind::StringListFromFiles => "stringListFromFiles",
            ParameterKind::Integer => "int",
            ParameterKind::IntegerList => "intList",
            ParameterKind::Float => "float",
            ParameterKind::FloatList => "floatList",
            ParameterKind::Bool => "bool",
            ParameterKind::Date => "date",
            ParameterKind::Choice => "choice",
            ParameterKind::ChoiceList => "choiceList",
            ParameterKind::File => "file",
            ParameterKind::FileList => "fileList",
            ParameterKind::ObjectFromFile => "objectFromFile",
            ParameterKind::ObjectListFromFile => "objectListFromFile",
            ParameterKind::ObjectListFromFiles => "objectListFromFiles",
            ParameterKind::KeyValue => "keyValue",
            ParameterKind::Unknown(s) => s,
        }
    }

    /// Kinds that accept several command-line values.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ParameterKind::StringList
                | ParameterKind::StringFromFiles
                | ParameterKind::StringListFromFiles
                | ParameterKind::IntegerList
                | ParameterKind::FloatList
                | ParameterKind::ChoiceList
                | ParameterKind::FileList
                | ParameterKind::ObjectListFromFiles
                | ParameterKind::KeyValue
        )
    }

    /// Value of an unset parameter without a default. Matches what generated
    /// parameter records hold after `from_values` on a missing entry.
    pub fn zero_value(&self) -> Value {
        match self {
            ParameterKind::String
            | ParameterKind::StringFromFile
            | ParameterKind::StringFromFiles
            | ParameterKind::Choice => Value::String(String::new()),
            ParameterKind::Integer => Value::Integer(0),
            ParameterKind::Float => Value::Float(0.0),
            ParameterKind::Bool => Value::Bool(false),
            ParameterKind::Date => Value::Date(chrono::DateTime::<chrono::Utc>::default()),
            ParameterKind::File => Value::File(FileData::default()),
            ParameterKind::KeyValue | ParameterKind::ObjectFromFile => Value::Object(BTreeMap::new()),
            ParameterKind::StringList
            | ParameterKind::StringListFromFile
            | ParameterKind::StringListFromFiles
            | ParameterKind::IntegerList
            | ParameterKind::FloatList
            | ParameterKind::ChoiceList
            | ParameterKind::FileList
            | ParameterKind::ObjectListFromFile
            | ParameterKind::ObjectListFromFiles => Value::List(Vec::new()),
            ParameterKind::Unknown(_) => Value::Null,
        }
    }

    /// Check that `value` fits this kind, converting where the shape is
    /// unambiguous (integers to floats, date strings to dates).
    pub fn coerce(&self, value: &Value, choices: &[String]) -> Result<Value, String> {
        if let Value::Null = value {
            return Ok(Value::Null);
        }
        match self {
            ParameterKind::String
            | ParameterKind::StringFromFile
            | ParameterKind::StringFromFiles => match value {
                Value::String(_) => Ok(value.clone()),
                other => Err(format!("expected string, got {}", other.type_name())),
            },
            ParameterKind::Choice => match value {
                Value::String(s) => check_choice(s, choices).map(|_| value.clone()),
                other => Err(format!("expected choice, got {}", other.type_name())),
            },
            ParameterKind::Integer => i64::from_value(value).map(Value::Integer),
            ParameterKind::Float => f64::from_value(value).map(Value::Float),
            ParameterKind::Bool => bool::from_value(value).map(Value::Bool),
            ParameterKind::Date => {
                chrono::DateTime::<chrono::Utc>::from_value(value).map(Value::Date)
            }
            ParameterKind::StringList
            | ParameterKind::StringListFromFile
            | ParameterKind::StringListFromFiles => {
                Vec::<String>::from_value(value).map(Value::from)
            }
            ParameterKind::ChoiceList => {
                let items = Vec::<String>::from_value(value)?;
                for item in &items {
                    check_choice(item, choices)?;
                }
                Ok(Value::from(items))
            }
            ParameterKind::IntegerList => Vec::<i64>::from_value(value).map(Value::from),
            ParameterKind::FloatList => Vec::<f64>::from_value(value).map(Value::from),
            ParameterKind::KeyValue => {
                BTreeMap::<String, String>::from_value(value).map(Value::from)
            }
            ParameterKind::ObjectFromFile => {
                BTreeMap::<String, Value>::from_value(value).map(Value::from)
            }
            ParameterKind::ObjectListFromFile | ParameterKind::ObjectListFromFiles => {
                Vec::<BTreeMap<String, Value>>::from_value(value).map(Value::from)
            }
            ParameterKind::File | ParameterKind::FileList => {
                Err("file parameters cannot carry a default".to_string())
            }
            ParameterKind::Unknown(_) => Ok(value.clone()),
        }
    }

    /// Parse raw command-line strings into a value of this kind.
    ///
    /// File kinds read the named files.
    pub fn parse_input(&self, raw: &[String], choices: &[String]) -> Result<Value, String> {
        let first = || {
            raw.first()
                .cloned()
                .ok_or_else(|| "missing value".to_string())
        };
        match self {
            ParameterKind::String | ParameterKind::Unknown(_) => first().map(Value::String),
            ParameterKind::Choice => {
                let s = first()?;
                check_choice(&s, choices)?;
                Ok(Value::String(s))
            }
            ParameterKind::StringList => Ok(Value::from(raw.to_vec())),
            ParameterKind::ChoiceList => {
                for s in raw {
                    check_choice(s, choices)?;
                }
                Ok(Value::from(raw.to_vec()))
            }
            ParameterKind::Integer => parse_int(&first()?).map(Value::Integer),
            ParameterKind::IntegerList => raw
                .iter()
                .map(|s| parse_int(s).map(Value::Integer))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            ParameterKind::Float => parse_float(&first()?).map(Value::Float),
            ParameterKind::FloatList => raw
                .iter()
                .map(|s| parse_float(s).map(Value::Float))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            ParameterKind::Bool => parse_bool(&first()?).map(Value::Bool),
            ParameterKind::Date => {
                let s = first()?;
                parse_date(&s)
                    .map(Value::Date)
                    .ok_or_else(|| format!("invalid date '{}'", s))
            }
            ParameterKind::KeyValue => {
                let mut map = BTreeMap::new();
                for item in raw {
                    let (k, v) = item
                        .split_once(':')
                        .ok_or_else(|| format!("expected key:value, got '{}'", item))?;
                    map.insert(k.trim().to_string(), Value::String(v.trim().to_string()));
                }
                Ok(Value::Object(map))
            }
            ParameterKind::File => read_file(&first()?).map(Value::File),
            ParameterKind::FileList => raw
                .iter()
                .map(|p| read_file(p).map(Value::File))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            ParameterKind::StringFromFile => read_file(&first()?).map(|f| Value::String(f.content)),
            ParameterKind::StringFromFiles => {
                let mut content = String::new();
                for path in raw {
                    content.push_str(&read_file(path)?.content);
                }
                Ok(Value::String(content))
            }
            ParameterKind::StringListFromFile | ParameterKind::StringListFromFiles => {
                let mut lines = Vec::new();
                for path in raw {
                    let file = read_file(path)?;
                    lines.extend(
                        file.content
                            .lines()
                            .filter(|l| !l.trim().is_empty())
                            .map(|l| Value::String(l.to_string())),
                    );
                }
                Ok(Value::List(lines))
            }
            ParameterKind::ObjectFromFile => {
                let file = read_file(&first()?)?;
                match parse_structured(&file)? {
                    obj @ Value::Object(_) => Ok(obj),
                    other => Err(format!("{}: expected object, got {}", file.path, other.type_name())),
                }
            }
            ParameterKind::ObjectListFromFile | ParameterKind::ObjectListFromFiles => {
                let mut objects = Vec::new();
                for path in raw {
                    let file = read_file(path)?;
                    match parse_structured(&file)? {
                        obj @ Value::Object(_) => objects.push(obj),
                        Value::List(items) => objects.extend(items),
                        other => {
                            return Err(format!(
                                "{}: expected object list, got {}",
                                file.path,
                                other.type_name()
                            ));
                        }
                    }
                }
                self.coerce(&Value::List(objects), choices)
            }
        }
    }
}

impl From<String> for ParameterKind {
    fn from(s: String) -> Self {
        ParameterKind::KNOWN
            .iter()
            .find(|k| k.as_str() == s)
            .cloned()
            .unwrap_or_else(|| match s.as_str() {
                "integer" => ParameterKind::Integer,
                "integerList" => ParameterKind::IntegerList,
                "boolean" => ParameterKind::Bool,
                _ => ParameterKind::Unknown(s),
            })
    }
}

impl From<ParameterKind> for String {
    fn from(k: ParameterKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_choice(s: &str, choices: &[String]) -> Result<(), String> {
    if choices.is_empty() || choices.iter().any(|c| c == s) {
        Ok(())
    } else {
        Err(format!("'{}' is not one of {}", s, choices.join(", ")))
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("invalid integer '{}'", s))
}

fn parse_float(s: &str) -> Result<f64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("invalid float '{}'", s))
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("invalid bool '{}'", s)),
    }
}

fn read_file(path: &str) -> Result<FileData, String> {
    fs::read_to_string(path)
        .map(|content| FileData::new(path, content))
        .map_err(|e| format!("could not read {}: {}", path, e))
}

fn parse_structured(file: &FileData) -> Result<Value, String> {
    serde_yaml::from_str(&file.content).map_err(|e| format!("{}: {}", file.path, e))
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A typed, named, documented input slot of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "shortFlag", skip_serializing_if = "Option::is_none")]
    pub short_flag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            help: String::new(),
            required: false,
            default: None,
            short_flag: None,
            choices: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_short_flag(mut self, short: impl Into<String>) -> Self {
        self.short_flag = Some(short.into());
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// The short flag as a single character, if one is declared.
    pub fn short_char(&self) -> Option<char> {
        self.short_flag.as_deref().and_then(|s| s.chars().next())
    }

    /// Value used when the parameter is not supplied: the declared default,
    /// else the kind's zero value.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(default) if !matches!(default, Value::Null) => default.clone(),
            _ => self.kind.zero_value(),
        }
    }

    fn validate(&mut self) -> SqlCraftResult<()> {
        if self.name.is_empty() {
            return Err(SqlCraftError::Load("parameter without a name".to_string()));
        }
        if let Some(short) = &self.short_flag {
            if short.chars().count() != 1 {
                return Err(SqlCraftError::parameter(
                    &self.name,
                    format!("short flag '{}' must be a single character", short),
                ));
            }
        }
        if let Some(default) = &self.default {
            let coerced = self.kind.coerce(default, &self.choices).map_err(|message| {
                SqlCraftError::InvalidDefault {
                    name: self.name.clone(),
                    kind: self.kind.to_string(),
                    message,
                }
            })?;
            self.default = Some(coerced);
        }
        Ok(())
    }
}

/// Ordered parameter definitions with unique names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ParameterDefinition>", into = "Vec<ParameterDefinition>")]
pub struct ParameterCollection {
    definitions: Vec<ParameterDefinition>,
}

impl ParameterCollection {
    pub fn new(definitions: Vec<ParameterDefinition>) -> SqlCraftResult<Self> {
        let mut collection = Self::default();
        for definition in definitions {
            collection.push(definition)?;
        }
        Ok(collection)
    }

    /// Append a definition, validating it and rejecting duplicate names.
    pub fn push(&mut self, mut definition: ParameterDefinition) -> SqlCraftResult<()> {
        definition.validate()?;
        if self.get(&definition.name).is_some() {
            return Err(SqlCraftError::DuplicateParameter(definition.name));
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParameterDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Default value (or null) for every definition.
    pub fn defaults(&self) -> ParameterValues {
        let mut values = ParameterValues::new();
        for definition in &self.definitions {
            values.insert(definition.name.clone(), definition.default_value());
        }
        values
    }
}

impl TryFrom<Vec<ParameterDefinition>> for ParameterCollection {
    type Error = SqlCraftError;

    fn try_from(definitions: Vec<ParameterDefinition>) -> Result<Self, Self::Error> {
        Self::new(definitions)
    }
}

impl From<ParameterCollection> for Vec<ParameterDefinition> {
    fn from(collection: ParameterCollection) -> Self {
        collection.definitions
    }
}

impl<'a> IntoIterator for &'a ParameterCollection {
    type Item = &'a ParameterDefinition;
    type IntoIter = std::slice::Iter<'a, ParameterDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.iter()
    }
}

/// Resolved values keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterValues(BTreeMap<String, Value>);

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overlay `other` on top of these values.
    pub fn extend(&mut self, other: &ParameterValues) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Convert one value to a concrete type; absent parameters read as null.
    pub fn extract<T: FromValue>(&self, name: &str) -> SqlCraftResult<T> {
        T::from_value(self.get(name).unwrap_or(&Value::Null))
            .map_err(|message| SqlCraftError::parameter(name, message))
    }

    /// The template data context.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParameterValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
