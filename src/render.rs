//! Query rendering.
//!
//! A query is a template over the merged parameter values. Templates can pull
//! in named sub-queries and use SQL helper functions whose quoting follows
//! the active [`Dialect`]:
//!
//! | Function | Output for `["a", "b"]` / `"x"` |
//! |----------|---------------------------------|
//! | `subquery NAME` | the rendered sub-query |
//! | `sqlStringIn` | `'a', 'b'` |
//! | `sqlIntIn` | `1, 2` (integers only) |
//! | `sqlIn` | literals by value type |
//! | `sqlString` | `'x'` |
//! | `sqlEscape` | `x` with quotes escaped |
//! | `sqlLike` | `'%x%'` |
//! | `sqlDate` / `sqlDateTime` | `'2024-01-31'` / `'2024-01-31 12:00:00'` |
//! | `sqlColumn` | `"x"` (or `` `x` `` on MySQL) |

use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::SqlCraftResult;
use crate::parameters::ParameterValues;
use crate::template::{Functions, Template, TemplateError};
use crate::value::{format_date, parse_date, Value};

/// Renders one query template together with its sub-queries.
pub struct QueryRenderer<'a> {
    query: &'a str,
    sub_queries: &'a BTreeMap<String, String>,
    dialect: Dialect,
}

impl<'a> QueryRenderer<'a> {
    pub fn new(query: &'a str, sub_queries: &'a BTreeMap<String, String>, dialect: Dialect) -> Self {
        Self {
            query,
            sub_queries,
            dialect,
        }
    }

    /// Render against `params`. The result is whitespace-normalized with
    /// [`clean_query`].
    pub fn render(&self, params: &ParameterValues) -> SqlCraftResult<String> {
        let functions = SqlFunctions {
            dialect: self.dialect,
            sub_queries: self.sub_queries,
            data: params.to_value(),
            stack: RefCell::new(Vec::new()),
        };
        let template = Template::parse("query", self.query)?;
        let rendered = template.execute(&functions.data, &functions)?;
        let query = clean_query(&rendered);
        debug!(dialect = %self.dialect, bytes = query.len(), "rendered query");
        Ok(query)
    }
}

/// Render `query` with `sub_queries` against `params`.
pub fn render_query(
    dialect: Dialect,
    query: &str,
    sub_queries: &BTreeMap<String, String>,
    params: &ParameterValues,
) -> SqlCraftResult<String> {
    QueryRenderer::new(query, sub_queries, dialect).render(params)
}

/// Trim trailing whitespace from every line, drop lines left empty and trim
/// the whole result. Non-whitespace text is never touched.
///
/// Lines inside a multi-line single-quoted literal are kept verbatim.
/// Quotes are tracked by parity only, so a backslash-escaped quote (MySQL)
/// inside a literal spanning lines can throw the tracking off.
pub fn clean_query(query: &str) -> String {
    let mut in_literal = false;
    let mut lines = Vec::new();
    for line in query.lines() {
        let starts_inside = in_literal;
        in_literal ^= line.matches('\'').count() % 2 == 1;
        if in_literal {
            lines.push(line);
        } else if starts_inside || !line.trim().is_empty() {
            lines.push(line.trim_end());
        }
    }
    lines.join("\n").trim().to_string()
}

struct SqlFunctions<'a> {
    dialect: Dialect,
    sub_queries: &'a BTreeMap<String, String>,
    data: Value,
    /// Sub-queries currently being rendered, outermost first.
    stack: RefCell<Vec<String>>,
}

impl SqlFunctions<'_> {
    fn sub_query(&self, args: &[Value]) -> Result<Value, TemplateError> {
        let name = match args {
            [Value::String(name)] => name,
            _ => return Err(TemplateError::func("subquery expects one name")),
        };
        let text = self
            .sub_queries
            .get(name)
            .ok_or_else(|| TemplateError::UnknownSubQuery(name.clone()))?;

        {
            let mut stack = self.stack.borrow_mut();
            if stack.contains(name) {
                let mut cycle = stack.clone();
                cycle.push(name.clone());
                return Err(TemplateError::CyclicSubQuery(cycle));
            }
            stack.push(name.clone());
        }
        let result = Template::parse(name, text).and_then(|t| t.execute(&self.data, self));
        self.stack.borrow_mut().pop();

        Ok(Value::String(clean_query(&result?)))
    }

    fn literal(&self, value: &Value) -> Result<String, TemplateError> {
        Ok(match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Date(d) => self.dialect.quote_string(&format_date(d)),
            Value::String(_) | Value::File(_) => self.dialect.quote_string(&value.to_string()),
            other => {
                return Err(TemplateError::func(format!(
                    "cannot use {} as a SQL literal",
                    other.type_name()
                )));
            }
        })
    }

    fn date(&self, args: &[Value], format: &str) -> Result<Value, TemplateError> {
        let date = match one(args)? {
            Value::Date(d) => *d,
            Value::String(s) => parse_date(s)
                .ok_or_else(|| TemplateError::func(format!("could not parse date {:?}", s)))?,
            other => {
                return Err(TemplateError::func(format!(
                    "expected date, got {}",
                    other.type_name()
                )));
            }
        };
        Ok(Value::String(
            self.dialect
                .quote_string(&date.format(format).to_string()),
        ))
    }
}

fn one(args: &[Value]) -> Result<&Value, TemplateError> {
    match args {
        [value] => Ok(value),
        _ => Err(TemplateError::func(format!(
            "wrong number of args: want 1, got {}",
            args.len()
        ))),
    }
}

/// Scalars behave like one-element lists; null is empty.
fn elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::List(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn join_elements(
    value: &Value,
    f: impl Fn(&Value) -> Result<String, TemplateError>,
) -> Result<Value, TemplateError> {
    let parts = elements(value)
        .into_iter()
        .map(f)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::String(parts.join(", ")))
}

impl Functions for SqlFunctions<'_> {
    fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value, TemplateError>> {
        let dialect = self.dialect;
        let result = match name {
            "subquery" | "subQuery" => self.sub_query(args),
            "sqlStringIn" => one(args).and_then(|v| {
                join_elements(v, |item| Ok(dialect.quote_string(&item.to_string())))
            }),
            "sqlIntIn" => one(args).and_then(|v| {
                join_elements(v, |item| match item {
                    Value::Integer(n) => Ok(n.to_string()),
                    Value::String(s) => s
                        .trim()
                        .parse::<i64>()
                        .map(|n| n.to_string())
                        .map_err(|_| TemplateError::func(format!("not an integer: {:?}", s))),
                    other => Err(TemplateError::func(format!(
                        "expected integer, got {}",
                        other.type_name()
                    ))),
                })
            }),
            "sqlIn" => one(args).and_then(|v| join_elements(v, |item| self.literal(item))),
            "sqlString" => {
                one(args).map(|v| Value::String(dialect.quote_string(&v.to_string())))
            }
            "sqlEscape" => {
                one(args).map(|v| Value::String(dialect.escape_string(&v.to_string())))
            }
            "sqlLike" => one(args).map(|v| {
                Value::String(format!("'%{}%'", dialect.escape_string(&v.to_string())))
            }),
            "sqlDate" => self.date(args, "%Y-%m-%d"),
            "sqlDateTime" => self.date(args, "%Y-%m-%d %H:%M:%S"),
            "sqlColumn" => one(args).and_then(|v| {
                join_elements(v, |item| Ok(dialect.quote_identifier(&item.to_string())))
            }),
            _ => return None,
        };
        Some(result)
    }
}
