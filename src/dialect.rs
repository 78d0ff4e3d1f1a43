//! SQL dialects.
//!
//! Rendering never parses SQL; the dialect only decides how helper functions
//! quote the literals and identifiers they produce.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    /// ANSI quoting, used when the driver is unknown.
    Generic,
}

impl Dialect {
    /// Detect the dialect from a connection URL or a `db-type` value.
    pub fn from_url(url: &str) -> Self {
        let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" | "pgx" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            _ => Dialect::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::Generic => "generic",
        }
    }

    /// Escape the body of a single-quoted string literal.
    pub fn escape_string(&self, s: &str) -> String {
        match self {
            Dialect::MySql => s.replace('\\', "\\\\").replace('\'', "''"),
            _ => s.replace('\'', "''"),
        }
    }

    /// A complete single-quoted string literal.
    pub fn quote_string(&self, s: &str) -> String {
        format!("'{}'", self.escape_string(s))
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
