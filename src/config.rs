//! Configuration file (`sqlcraft.toml`).
//!
//! ```toml
//! log-level = "info"
//! repositories = ["~/sqlcraft/queries"]
//!
//! [connection]
//! db-type = "postgres"
//! host = "localhost"
//!
//! [dbt]
//! use-dbt-profiles = false
//! ```
//!
//! `[connection]` and `[dbt]` override the defaults of the `sql-connection`
//! and `dbt` layers. Command-line flags and environment variables still win.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::CommandDescription;
use crate::error::{SqlCraftError, SqlCraftResult};
use crate::layers::{DBT_SLUG, ParsedLayers, SQL_CONNECTION_SLUG};
use crate::value::Value;

pub const CONFIG_FILE: &str = "sqlcraft.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    pub log_level: Option<String>,
    pub repositories: Vec<String>,
    pub connection: BTreeMap<String, toml::Value>,
    pub dbt: BTreeMap<String, toml::Value>,
}

impl Config {
    pub fn parse(source: &str) -> SqlCraftResult<Self> {
        toml::from_str(source).map_err(|e| SqlCraftError::Config(e.to_string()))
    }

    /// `explicit`, else `./sqlcraft.toml`, else the user config directory.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("sqlcraft").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Load the located file. Only an explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> SqlCraftResult<Self> {
        let Some(path) = Self::locate(explicit) else {
            return Ok(Self::default());
        };
        let source = fs::read_to_string(&path)
            .map_err(|e| SqlCraftError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&source)
            .map_err(|e| SqlCraftError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Repository directories with `~` expanded.
    pub fn repository_paths(&self) -> Vec<PathBuf> {
        self.repositories.iter().map(|r| expand_home(r)).collect()
    }

    /// Overwrite layer defaults with configured values, coerced to the
    /// declared parameter kinds.
    pub fn apply(
        &self,
        description: &CommandDescription,
        layers: &mut ParsedLayers,
    ) -> SqlCraftResult<()> {
        for (slug, table) in [(SQL_CONNECTION_SLUG, &self.connection), (DBT_SLUG, &self.dbt)] {
            let Some(layer) = description.layer(slug) else {
                continue;
            };
            for (name, raw) in table {
                let definition = layer.flags.get(name).ok_or_else(|| {
                    SqlCraftError::Config(format!("unknown setting '{}' in [{}]", name, slug))
                })?;
                let value = definition
                    .kind
                    .coerce(&toml_to_value(raw), &definition.choices)
                    .map_err(|message| SqlCraftError::parameter(name, message))?;
                layers.set(slug, name.clone(), value);
            }
        }
        Ok(())
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => Value::Integer(*n),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::load_from_str;

    const CONFIG: &str = r#"
log-level = "debug"
repositories = ["/srv/queries", "~/queries"]

[connection]
db-type = "sqlite"
database = "jobs.db"
port = 5432

[dbt]
use-dbt-profiles = false
"#;

    #[test]
    fn test_parse() {
        let config = Config::parse(CONFIG).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.repository_paths()[0], PathBuf::from("/srv/queries"));
        assert_eq!(config.connection.len(), 3);
        assert!(Config::parse("nonsense = 1").is_err());
    }

    #[test]
    fn test_apply_overrides_layer_defaults() {
        let config = Config::parse(CONFIG).unwrap();
        let cmd = load_from_str("name: a\nshort: a\nquery: SELECT 1\n").unwrap().remove(0);
        let mut layers = cmd.default_layers();
        config.apply(&cmd.description, &mut layers).unwrap();
        assert_eq!(
            layers.get_parameter(SQL_CONNECTION_SLUG, "db-type"),
            Some(&Value::String("sqlite".to_string()))
        );
        assert_eq!(
            layers.get_parameter(SQL_CONNECTION_SLUG, "port"),
            Some(&Value::Integer(5432))
        );
    }

    #[test]
    fn test_apply_rejects_unknown_and_invalid() {
        let cmd = load_from_str("name: a\nshort: a\nquery: SELECT 1\n").unwrap().remove(0);
        let mut layers = cmd.default_layers();
        let unknown = Config::parse("[connection]\nhots = \"x\"\n").unwrap();
        assert!(unknown.apply(&cmd.description, &mut layers).is_err());
        let bad_choice = Config::parse("[connection]\ndb-type = \"oracle\"\n").unwrap();
        assert!(bad_choice.apply(&cmd.description, &mut layers).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let missing = Path::new("/nonexistent/sqlcraft.toml");
        assert!(Config::load(Some(missing)).is_err());
    }
}
