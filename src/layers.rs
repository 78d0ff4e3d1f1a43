//! Auxiliary parameter layers and their resolved values.
//!
//! A command's own flags and arguments live in the [`DEFAULT_SLUG`] layer.
//! Every loaded command also carries the four standard layers, appended in
//! this order: sql helpers, output, sql connection, dbt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::command::CommandDescription;
use crate::error::SqlCraftResult;
use crate::parameters::{ParameterCollection, ParameterDefinition, ParameterKind, ParameterValues};
use crate::value::Value;

pub const DEFAULT_SLUG: &str = "default";
pub const SQL_HELPERS_SLUG: &str = "sql-helpers";
pub const OUTPUT_SLUG: &str = "glazed";
pub const SQL_CONNECTION_SLUG: &str = "sql-connection";
pub const DBT_SLUG: &str = "dbt";

pub const PRINT_QUERY: &str = "print-query";
pub const EXPLAIN: &str = "explain";

/// A named group of parameters that is not part of the command itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterLayer {
    pub slug: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub flags: ParameterCollection,
}

impl ParameterLayer {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        flags: Vec<ParameterDefinition>,
    ) -> SqlCraftResult<Self> {
        Ok(Self {
            slug: slug.into(),
            name: name.into(),
            description: String::new(),
            flags: ParameterCollection::new(flags)?,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// `print-query` and `explain`.
    pub fn sql_helpers() -> SqlCraftResult<Self> {
        Ok(Self::new(
            SQL_HELPERS_SLUG,
            "SQL helpers",
            vec![
                ParameterDefinition::new(PRINT_QUERY, ParameterKind::Bool)
                    .with_help("Print the rendered query instead of running it")
                    .with_default(false),
                ParameterDefinition::new(EXPLAIN, ParameterKind::Bool)
                    .with_help("Prefix the rendered query with EXPLAIN")
                    .with_default(false),
            ],
        )?
        .with_description("Flags controlling how the query is rendered"))
    }

    /// Result formatting.
    pub fn output() -> SqlCraftResult<Self> {
        Self::new(
            OUTPUT_SLUG,
            "Output",
            vec![
                ParameterDefinition::new("output", ParameterKind::Choice)
                    .with_help("Output format")
                    .with_choices(["table", "json", "csv", "yaml"])
                    .with_default("table"),
                ParameterDefinition::new("fields", ParameterKind::StringList)
                    .with_help("Columns to output (default: all)"),
            ],
        )
    }

    /// Database connection settings.
    pub fn sql_connection() -> SqlCraftResult<Self> {
        Self::new(
            SQL_CONNECTION_SLUG,
            "SQL connection",
            vec![
                ParameterDefinition::new("db-type", ParameterKind::Choice)
                    .with_help("Database type")
                    .with_choices(["postgres", "mysql", "sqlite"])
                    .with_default("postgres"),
                ParameterDefinition::new("host", ParameterKind::String)
                    .with_help("Database host")
                    .with_default("localhost"),
                ParameterDefinition::new("port", ParameterKind::Integer).with_help("Database port"),
                ParameterDefinition::new("database", ParameterKind::String)
                    .with_help("Database name (file path for sqlite)"),
                ParameterDefinition::new("user", ParameterKind::String).with_help("Database user"),
                ParameterDefinition::new("password", ParameterKind::String)
                    .with_help("Database password"),
                ParameterDefinition::new("schema", ParameterKind::String)
                    .with_help("Database schema"),
                ParameterDefinition::new("dsn", ParameterKind::String)
                    .with_help("Connection URL, overrides the other connection flags"),
            ],
        )
    }

    /// Connection settings read from a dbt `profiles.yml`.
    pub fn dbt() -> SqlCraftResult<Self> {
        Self::new(
            DBT_SLUG,
            "dbt",
            vec![
                ParameterDefinition::new("use-dbt-profiles", ParameterKind::Bool)
                    .with_help("Use dbt profiles.yml to connect")
                    .with_default(false),
                ParameterDefinition::new("dbt-profiles-path", ParameterKind::String)
                    .with_help("Path to dbt profiles.yml (default: ~/.dbt/profiles.yml)"),
                ParameterDefinition::new("dbt-profile", ParameterKind::String)
                    .with_help("dbt profile to use, as profile or profile.target"),
            ],
        )
    }

    /// The standard layers in the order they are appended to a command.
    pub fn standard() -> SqlCraftResult<Vec<Self>> {
        Ok(vec![
            Self::sql_helpers()?,
            Self::output()?,
            Self::sql_connection()?,
            Self::dbt()?,
        ])
    }
}

/// Already-merged parameter values, grouped by layer slug.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLayers {
    layers: BTreeMap<String, ParameterValues>,
}

impl ParsedLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every declared parameter of `description`, set to its default.
    pub fn from_defaults(description: &CommandDescription) -> Self {
        let mut parsed = Self::new();
        let mut defaults = description.flags.defaults();
        defaults.extend(&description.arguments.defaults());
        parsed.layers.insert(DEFAULT_SLUG.to_string(), defaults);
        for layer in &description.layers {
            parsed
                .layers
                .entry(layer.slug.clone())
                .or_default()
                .extend(&layer.flags.defaults());
        }
        parsed
    }

    pub fn set(&mut self, slug: &str, name: impl Into<String>, value: impl Into<Value>) {
        self.layers
            .entry(slug.to_string())
            .or_default()
            .insert(name, value);
    }

    pub fn get_parameter(&self, slug: &str, name: &str) -> Option<&Value> {
        self.layers.get(slug).and_then(|l| l.get(name))
    }

    pub fn layer(&self, slug: &str) -> Option<&ParameterValues> {
        self.layers.get(slug)
    }

    pub fn default_values(&self) -> ParameterValues {
        self.layers.get(DEFAULT_SLUG).cloned().unwrap_or_default()
    }

    /// All layers flattened into one map; the command's own parameters win
    /// over auxiliary layers on name clashes.
    pub fn merged(&self) -> ParameterValues {
        let mut merged = ParameterValues::new();
        for (slug, values) in &self.layers {
            if slug != DEFAULT_SLUG {
                merged.extend(values);
            }
        }
        if let Some(defaults) = self.layers.get(DEFAULT_SLUG) {
            merged.extend(defaults);
        }
        merged
    }

    fn flag(&self, name: &str) -> bool {
        self.get_parameter(SQL_HELPERS_SLUG, name)
            .is_some_and(Value::is_truthy)
    }

    pub fn print_query(&self) -> bool {
        self.flag(PRINT_QUERY)
    }

    pub fn explain(&self) -> bool {
        self.flag(EXPLAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layer_order() {
        let slugs: Vec<_> = ParameterLayer::standard()
            .unwrap()
            .into_iter()
            .map(|l| l.slug)
            .collect();
        assert_eq!(slugs, vec![SQL_HELPERS_SLUG, OUTPUT_SLUG, SQL_CONNECTION_SLUG, DBT_SLUG]);
    }

    #[test]
    fn test_merged_prefers_command_parameters() {
        let mut parsed = ParsedLayers::new();
        parsed.set(SQL_CONNECTION_SLUG, "host", "db");
        parsed.set(SQL_HELPERS_SLUG, "limit", 1);
        parsed.set(DEFAULT_SLUG, "limit", 10);
        let merged = parsed.merged();
        assert_eq!(merged.get("limit"), Some(&Value::Integer(10)));
        assert_eq!(merged.get("host"), Some(&Value::String("db".into())));
    }

    #[test]
    fn test_print_query_flag() {
        let mut parsed = ParsedLayers::new();
        assert!(!parsed.print_query());
        parsed.set(SQL_HELPERS_SLUG, PRINT_QUERY, true);
        assert!(parsed.print_query());
    }
}
