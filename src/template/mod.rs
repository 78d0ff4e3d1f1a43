//! Text templates for SQL.
//!
//! The syntax is the familiar `{{ ... }}` action language:
//!
//! ```text
//! SELECT * FROM jobs
//! WHERE 1 = 1
//! {{ if .status }}  AND status IN ({{ .status | sqlStringIn }}){{ end }}
//! {{ range $i, $c := .columns }}{{ if $i }}, {{ end }}{{ $c }}{{ end }}
//! {{- /* trim markers eat the surrounding whitespace */ -}}
//! ```
//!
//! Templates are parsed once into a [`Template`] and executed against a
//! [`Value`] data context. Functions other than the builtins are supplied by
//! the caller through the [`Functions`] trait.

mod exec;
mod funcs;
mod parser;

use thiserror::Error;

use crate::value::Value;

/// Errors raised while parsing or executing a template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// Malformed template text.
    #[error("template: {name}:{line}: {message}")]
    Parse {
        name: String,
        line: usize,
        message: String,
    },

    /// Evaluation failed (undefined field, bad function argument, ...).
    #[error("template: {name}: executing: {message}")]
    Exec { name: String, message: String },

    /// Raised by a function; the executor attaches the template name.
    #[error("{0}")]
    Func(String),

    /// A sub-query includes itself, directly or through others.
    #[error("cyclic sub-query reference: {}", .0.join(" -> "))]
    CyclicSubQuery(Vec<String>),

    /// A sub-query name that the command does not define.
    #[error("sub-query \"{0}\" is not defined")]
    UnknownSubQuery(String),
}

impl TemplateError {
    pub fn func(message: impl Into<String>) -> Self {
        Self::Func(message.into())
    }
}

/// Caller-supplied template functions.
pub trait Functions {
    /// Call `name`, or return `None` if this namespace does not define it.
    fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value, TemplateError>>;
}

/// A namespace with only the builtins.
pub struct NoFunctions;

impl Functions for NoFunctions {
    fn call(&self, _name: &str, _args: &[Value]) -> Option<Result<Value, TemplateError>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    With {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub decl: Vec<String>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// `.a.b`; an empty path is the dot itself.
    Field(Vec<String>),
    /// `$name.a.b`; the root variable is `$`.
    Variable(String, Vec<String>),
    Func(String),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Sub(Box<Pipeline>, Vec<String>),
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `text`; `name` is used in error messages.
    pub fn parse(name: &str, text: &str) -> Result<Self, TemplateError> {
        let nodes = parser::parse(name, text)?;
        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute against `data`. Missing fields are errors.
    pub fn execute(&self, data: &Value, funcs: &dyn Functions) -> Result<String, TemplateError> {
        exec::execute(&self.name, &self.nodes, data, funcs)
    }
}
