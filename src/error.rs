//! Error types for sqlcraft.

use thiserror::Error;

use crate::template::TemplateError;

/// The main error type for sqlcraft operations.
#[derive(Debug, Error)]
pub enum SqlCraftError {
    /// The command document could not be decoded.
    #[error("could not load command: {0}")]
    Load(String),

    /// The command decoded but is missing required fields.
    #[error("invalid command '{name}': missing required field(s) {}", .missing.join(", "))]
    InvalidCommand {
        name: String,
        missing: Vec<&'static str>,
    },

    /// Two parameters with the same name in one collection.
    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),

    /// A parameter default does not fit its declared kind.
    #[error("invalid default for parameter '{name}' of type {kind}: {message}")]
    InvalidDefault {
        name: String,
        kind: String,
        message: String,
    },

    /// A parameter value could not be parsed or converted.
    #[error("invalid value for parameter '{name}': {message}")]
    Parameter { name: String, message: String },

    /// The connection factory failed.
    #[error("could not open database: {0}")]
    Connection(String),

    /// The liveness check against an opened connection failed.
    #[error("could not ping database: {0}")]
    Ping(String),

    /// A generated command was run without a connection handle.
    #[error("database connection is not set")]
    MissingConnection,

    /// An interpreted command was run without a connection factory.
    #[error("connection factory is not set")]
    MissingConnectionFactory,

    /// Template parse or execution failure.
    #[error("could not render query: {0}")]
    Render(#[from] TemplateError),

    /// The database rejected the rendered query.
    #[error("could not run query: {0}")]
    Execution(String),

    /// Internal code generation failure.
    #[error("could not generate code: {0}")]
    Codegen(String),

    /// A code generation input did not decode to exactly one command.
    #[error("expected exactly one command, got {0}")]
    CommandCount(usize),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqlCraftError {
    /// Create a parameter value error.
    pub fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<std::fmt::Error> for SqlCraftError {
    fn from(e: std::fmt::Error) -> Self {
        Self::Codegen(e.to_string())
    }
}

/// Result type alias for sqlcraft operations.
pub type SqlCraftResult<T> = Result<T, SqlCraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_command_display() {
        let err = SqlCraftError::InvalidCommand {
            name: "ls".to_string(),
            missing: vec!["short", "query"],
        };
        assert_eq!(
            err.to_string(),
            "invalid command 'ls': missing required field(s) short, query"
        );
    }

    #[test]
    fn test_command_count_display() {
        assert_eq!(
            SqlCraftError::CommandCount(2).to_string(),
            "expected exactly one command, got 2"
        );
    }
}
