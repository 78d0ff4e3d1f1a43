//! `SELECT` builder behind the `select` subcommand.
//!
//! The same options either produce a ready-to-run query or a command
//! document whose unset clauses become template parameters.

use std::collections::BTreeMap;

use crate::command::{CommandDescription, SqlCommand};
use crate::error::SqlCraftResult;
use crate::layers::ParameterLayer;
use crate::parameters::{ParameterCollection, ParameterDefinition, ParameterKind, ParameterValues};

pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub where_clause: Option<String>,
    pub order_by: Option<String>,
    /// 0 disables the clause.
    pub limit: i64,
    pub offset: i64,
    pub count: bool,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            where_clause: None,
            order_by: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            count: false,
        }
    }

    /// Read the options declared by [`select_description`].
    pub fn from_values(values: &ParameterValues) -> SqlCraftResult<Self> {
        let optional = |name: &str| -> SqlCraftResult<Option<String>> {
            let s: String = values.extract(name)?;
            Ok(Some(s).filter(|s| !s.is_empty()))
        };
        Ok(Self {
            table: values.extract("table")?,
            columns: values.extract("columns")?,
            where_clause: optional("where")?,
            order_by: optional("order-by")?,
            limit: values.extract("limit")?,
            offset: values.extract("offset")?,
            count: values.extract("count")?,
        })
    }

    fn column_list(&self) -> String {
        if self.count {
            "COUNT(*) AS count".to_string()
        } else if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        }
    }

    fn where_text(&self) -> Option<&str> {
        self.where_clause.as_deref().filter(|w| !w.is_empty())
    }

    fn order_text(&self) -> Option<&str> {
        self.order_by.as_deref().filter(|o| !o.is_empty())
    }

    /// The query as plain SQL.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.column_list(), self.table);

        if let Some(w) = self.where_text() {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        if let Some(order) = self.order_text() {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        // A count returns one row; a limit would only hide it.
        if self.limit > 0 && !self.count {
            sql.push_str(&format!(" LIMIT {}", self.limit));
        }
        if self.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", self.offset));
        }
        sql
    }

    fn short(&self) -> String {
        match (self.where_text(), self.count) {
            (Some(w), _) => format!("Select from {} where {}", self.table, w),
            (None, true) => format!("Count all rows from {}", self.table),
            (None, false) => format!("Select columns from {}", self.table),
        }
    }

    /// A command named `name` whose unset clauses are flags.
    pub fn to_command(&self, name: &str) -> SqlCraftResult<SqlCommand> {
        let mut flags = Vec::new();
        if self.where_text().is_none() {
            flags.push(ParameterDefinition::new("where", ParameterKind::String));
        }
        flags.push(
            ParameterDefinition::new("limit", ParameterKind::Integer)
                .with_help(format!(
                    "Limit the number of rows (default: {}), set to 0 to disable",
                    self.limit
                ))
                .with_default(self.limit),
        );
        flags.push(
            ParameterDefinition::new("offset", ParameterKind::Integer)
                .with_help(format!("Offset the number of rows (default: {})", self.offset))
                .with_default(self.offset),
        );
        let order_by = match self.order_text() {
            Some(order) => ParameterDefinition::new("order_by", ParameterKind::String)
                .with_help(format!("Order by (default: {})", order))
                .with_default(order),
            None => ParameterDefinition::new("order_by", ParameterKind::String).with_help("Order by"),
        };
        flags.push(order_by);

        let mut query = format!("SELECT {} FROM {}", self.column_list(), self.table);
        match self.where_text() {
            Some(w) => query.push_str(&format!(" WHERE {}", w)),
            None => query.push_str("\n{{ if .where }}  WHERE {{ .where }} {{ end }}"),
        }
        query.push_str("\n{{ if .order_by }} ORDER BY {{ .order_by }}{{ end }}");
        query.push_str("\n{{ if .limit }} LIMIT {{ .limit }}{{ end }}");
        query.push_str("\nOFFSET {{ .offset }}");

        let description = CommandDescription::new(name)
            .with_short(self.short())
            .with_flags(ParameterCollection::new(flags)?);
        SqlCommand::new(description, query, BTreeMap::new())
    }

    /// The command document for [`Self::to_command`], without the standard
    /// layers the loader adds back.
    pub fn to_command_yaml(&self, name: &str) -> SqlCraftResult<String> {
        let mut command = self.to_command(name)?;
        command.description.layers.clear();
        command.to_yaml()
    }
}

/// Options of the `select` subcommand, with the standard layers.
pub fn select_description() -> SqlCraftResult<CommandDescription> {
    let flags = ParameterCollection::new(vec![
        ParameterDefinition::new("columns", ParameterKind::StringList).with_help("Columns to select"),
        ParameterDefinition::new("where", ParameterKind::String).with_help("Where clause"),
        ParameterDefinition::new("order-by", ParameterKind::String).with_help("Order by clause"),
        ParameterDefinition::new("limit", ParameterKind::Integer)
            .with_help("Limit clause, 0 for no limit")
            .with_default(DEFAULT_LIMIT),
        ParameterDefinition::new("offset", ParameterKind::Integer)
            .with_help("Offset clause")
            .with_default(0),
        ParameterDefinition::new("count", ParameterKind::Bool)
            .with_help("Count rows instead of selecting them")
            .with_default(false),
        ParameterDefinition::new("create-query", ParameterKind::String)
            .with_help("Output the query as a command document with this name"),
    ])?;
    let arguments = ParameterCollection::new(vec![
        ParameterDefinition::new("table", ParameterKind::String)
            .with_help("Table to select from")
            .with_required(true),
    ])?;
    Ok(CommandDescription::new("select")
        .with_short("Select all columns from a table")
        .with_flags(flags)
        .with_arguments(arguments)
        .with_layers(ParameterLayer::standard()?))
}
