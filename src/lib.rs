//! # sqlcraft: declarative SQL commands
//!
//! A command is a YAML document holding a templated SQL query, its typed
//! parameters and optional named sub-queries. sqlcraft renders the query
//! for a set of parameter values, runs it against a database, or compiles
//! the command into Rust code that does the same without the document.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlcraft::prelude::*;
//!
//! let cmd = sqlcraft::load_from_str(r#"
//! name: ls
//! short: list
//! query: "SELECT * FROM t WHERE 1=1{{ if .limit }} LIMIT {{ .limit }}{{ end }}"
//! "#)?.remove(0);
//!
//! let params: ParameterValues = [("limit", 10)].into_iter().collect();
//! let sql = render_query(Dialect::Postgres, &cmd.query, &cmd.sub_queries, &params)?;
//! // => "SELECT * FROM t WHERE 1=1 LIMIT 10"
//! ```
//!
//! ## Template helpers
//!
//! | Function       | Output                                |
//! |----------------|---------------------------------------|
//! | `subquery`     | a named sub-query, rendered inline    |
//! | `sqlStringIn`  | `'a', 'b'` for use inside `IN (...)`  |
//! | `sqlIntIn`     | `1, 2`                                |
//! | `sqlString`    | one quoted string literal             |
//! | `sqlLike`      | `'%x%'`                               |
//! | `sqlDate`      | `'2024-01-01'`                        |
//! | `sqlColumn`    | a quoted identifier                   |

pub mod cli;
pub mod codegen;
pub mod command;
pub mod config;
pub mod dbt;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod layers;
pub mod output;
pub mod parameters;
pub mod render;
pub mod select;
pub mod template;
pub mod value;

/// Re-exported so generated code only depends on this crate.
pub use chrono;

pub use command::{load_from_directory, load_from_file, load_from_str, load_from_yaml};

pub mod prelude {
    pub use crate::command::{CommandDescription, SqlCommand};
    pub use crate::dialect::Dialect;
    pub use crate::engine::{
        Connection, ConnectionFactory, Row, RowSink, RunOutcome, VecSink, apply_helpers,
        print_query, run_query,
    };
    pub use crate::error::{SqlCraftError, SqlCraftResult};
    pub use crate::layers::{ParameterLayer, ParsedLayers};
    pub use crate::parameters::{
        ParameterCollection, ParameterDefinition, ParameterKind, ParameterValues,
    };
    pub use crate::render::render_query;
    pub use crate::value::{FileData, FromValue, Value};
}
