//! Command model and YAML loader.
//!
//! A command document looks like this:
//!
//! ```yaml
//! name: ls-jobs
//! short: List jobs
//! flags:
//!   - name: status
//!     type: stringList
//!     help: Status
//!   - name: limit
//!     type: int
//!     default: 10
//! subqueries:
//!   recent: SELECT id FROM jobs WHERE updated_at > now() - interval '1 day'
//! query: |
//!   SELECT * FROM jobs
//!   WHERE id IN ({{ subquery "recent" }})
//!   {{ if .status }}AND status IN ({{ .status | sqlStringIn }}){{ end }}
//!   LIMIT {{ .limit }}
//! ```
//!
//! Several documents may share one file, separated by `---`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::ConnectionFactory;
use crate::error::{SqlCraftError, SqlCraftResult};
use crate::layers::{ParameterLayer, ParsedLayers};
use crate::parameters::ParameterCollection;

/// Name, help text and parameters of a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long: String,
    /// Presentation hints; carried through untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout: Vec<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "ParameterCollection::is_empty")]
    pub flags: ParameterCollection,
    #[serde(default, skip_serializing_if = "ParameterCollection::is_empty")]
    pub arguments: ParameterCollection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<ParameterLayer>,
}

impl CommandDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    pub fn with_long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    pub fn with_flags(mut self, flags: ParameterCollection) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_arguments(mut self, arguments: ParameterCollection) -> Self {
        self.arguments = arguments;
        self
    }

    /// Append layers whose slug is not present yet.
    pub fn with_layers(mut self, layers: Vec<ParameterLayer>) -> Self {
        for layer in layers {
            if !self.layers.iter().any(|l| l.slug == layer.slug) {
                self.layers.push(layer);
            }
        }
        self
    }

    pub fn layer(&self, slug: &str) -> Option<&ParameterLayer> {
        self.layers.iter().find(|l| l.slug == slug)
    }
}

/// A parameterized SQL command.
#[derive(Clone)]
pub struct SqlCommand {
    pub description: CommandDescription,
    pub query: String,
    pub sub_queries: BTreeMap<String, String>,
    factory: Option<Arc<dyn ConnectionFactory>>,
}

impl fmt::Debug for SqlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlCommand")
            .field("description", &self.description)
            .field("query", &self.query)
            .field("sub_queries", &self.sub_queries)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

impl SqlCommand {
    /// Build a command, appending the standard layers and validating it.
    pub fn new(
        description: CommandDescription,
        query: impl Into<String>,
        sub_queries: BTreeMap<String, String>,
    ) -> SqlCraftResult<Self> {
        let command = Self {
            description: description.with_layers(ParameterLayer::standard()?),
            query: query.into(),
            sub_queries,
            factory: None,
        };
        let missing = command.missing_fields();
        if !missing.is_empty() {
            return Err(SqlCraftError::InvalidCommand {
                name: command.description.name.clone(),
                missing,
            });
        }
        Ok(command)
    }

    pub fn name(&self) -> &str {
        &self.description.name
    }

    /// Required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.description.name.is_empty() {
            missing.push("name");
        }
        if self.description.short.is_empty() {
            missing.push("short");
        }
        if self.query.is_empty() {
            missing.push("query");
        }
        missing
    }

    pub fn is_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn with_connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn connection_factory(&self) -> Option<&Arc<dyn ConnectionFactory>> {
        self.factory.as_ref()
    }

    /// Every parameter of every layer set to its default.
    pub fn default_layers(&self) -> ParsedLayers {
        ParsedLayers::from_defaults(&self.description)
    }

    /// Serialize back into a command document.
    pub fn to_yaml(&self) -> SqlCraftResult<String> {
        let document = SqlCommandDocument {
            description: self.description.clone(),
            sub_queries: self.sub_queries.clone(),
            query: self.query.clone(),
        };
        serde_yaml::to_string(&document).map_err(|e| SqlCraftError::Load(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SqlCommandDocument {
    #[serde(flatten)]
    description: CommandDescription,
    #[serde(default, rename = "subqueries", skip_serializing_if = "BTreeMap::is_empty")]
    sub_queries: BTreeMap<String, String>,
    #[serde(default)]
    query: String,
}

impl SqlCommandDocument {
    fn into_command(self) -> SqlCraftResult<SqlCommand> {
        SqlCommand::new(self.description, self.query, self.sub_queries)
    }
}

/// Load every command in a YAML stream.
pub fn load_from_yaml<R: Read>(reader: R) -> SqlCraftResult<Vec<SqlCommand>> {
    let mut commands = Vec::new();
    for document in serde_yaml::Deserializer::from_reader(reader) {
        let document = SqlCommandDocument::deserialize(document)
            .map_err(|e| SqlCraftError::Load(e.to_string()))?;
        let command = document.into_command()?;
        debug!(command = %command.name(), "loaded command");
        commands.push(command);
    }
    Ok(commands)
}

pub fn load_from_str(source: &str) -> SqlCraftResult<Vec<SqlCommand>> {
    load_from_yaml(source.as_bytes())
}

/// Load every command in a file. Errors name the file.
pub fn load_from_file(path: &Path) -> SqlCraftResult<Vec<SqlCommand>> {
    let file = fs::File::open(path)?;
    load_from_yaml(file).map_err(|e| match e {
        SqlCraftError::Load(message) => {
            SqlCraftError::Load(format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

/// Load every `*.yaml`/`*.yml` below `dir`, in path order.
pub fn load_from_directory(dir: &Path) -> SqlCraftResult<Vec<SqlCommand>> {
    let mut files = Vec::new();
    collect_yaml_files(dir, &mut files)?;
    files.sort();

    let mut commands = Vec::new();
    for file in &files {
        commands.extend(load_from_file(file)?);
    }
    info!(dir = %dir.display(), count = commands.len(), "loaded repository");
    Ok(commands)
}

fn collect_yaml_files(dir: &Path, files: &mut Vec<PathBuf>) -> SqlCraftResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_yaml_files(&path, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            files.push(path);
        }
    }
    Ok(())
}
