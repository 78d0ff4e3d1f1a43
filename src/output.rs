//! Row sinks that format query results.

use colored::*;
use std::io::{self, Write};
use std::str::FromStr;

use crate::engine::{Row, RowSink};
use crate::error::{SqlCraftError, SqlCraftResult};
use crate::layers::{OUTPUT_SLUG, ParsedLayers};
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = SqlCraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "yaml" => Ok(Self::Yaml),
            other => Err(SqlCraftError::parameter(
                "output",
                format!("unknown output format '{}'", other),
            )),
        }
    }
}

/// Format and field selection from the output layer.
pub fn output_settings(layers: &ParsedLayers) -> SqlCraftResult<(OutputFormat, Vec<String>)> {
    let format = match layers.get_parameter(OUTPUT_SLUG, "output") {
        Some(Value::String(s)) => s.parse()?,
        _ => OutputFormat::default(),
    };
    let fields = match layers.get_parameter(OUTPUT_SLUG, "fields") {
        Some(Value::List(items)) => items.iter().map(|v| v.to_string()).collect(),
        _ => Vec::new(),
    };
    Ok((format, fields))
}

/// Build the sink selected by the output layer.
pub fn sink_for<W>(layers: &ParsedLayers, writer: W) -> SqlCraftResult<Box<dyn RowSink>>
where
    W: Write + Send + 'static,
{
    let (format, fields) = output_settings(layers)?;
    Ok(match format {
        OutputFormat::Table => Box::new(TableSink::new(writer, fields)),
        OutputFormat::Json => Box::new(JsonSink::new(writer, fields)),
        OutputFormat::Csv => Box::new(CsvSink::new(writer, fields)),
        OutputFormat::Yaml => Box::new(YamlSink::new(writer, fields)),
    })
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

/// Aligned, colored table written once all rows are in.
pub struct TableSink<W> {
    writer: W,
    fields: Vec<String>,
    rows: Vec<Row>,
}

impl<W: Write + Send> TableSink<W> {
    pub fn new(writer: W, fields: Vec<String>) -> Self {
        Self {
            writer,
            fields,
            rows: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RowSink for TableSink<W> {
    fn push(&mut self, row: Row) -> SqlCraftResult<()> {
        self.rows.push(row.select(&self.fields));
        Ok(())
    }

    fn finish(&mut self) -> SqlCraftResult<()> {
        let Some(first) = self.rows.first() else {
            writeln!(self.writer, "{}", "(no results)".dimmed())?;
            return Ok(());
        };

        let columns: Vec<String> = first.column_names().map(str::to_string).collect();
        let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, column) in columns.iter().enumerate() {
                let len = row.get(column).map(cell_text).unwrap_or_default().chars().count();
                widths[i] = widths[i].max(len);
            }
        }

        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:width$}", c, width = w))
            .collect();
        writeln!(self.writer, "{}", header.join(" │ ").white().bold())?;

        let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        writeln!(self.writer, "{}", sep.join("─┼─").dimmed())?;

        for row in &self.rows {
            let cells: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| {
                    let val = row.get(c).map(cell_text).unwrap_or_default();
                    format!("{:width$}", val, width = w)
                })
                .collect();
            writeln!(self.writer, "{}", cells.join(" │ "))?;
        }

        writeln!(self.writer)?;
        writeln!(self.writer, "{} row(s) returned", self.rows.len().to_string().cyan())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// A pretty-printed JSON array.
pub struct JsonSink<W> {
    writer: W,
    fields: Vec<String>,
    rows: Vec<Row>,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W, fields: Vec<String>) -> Self {
        Self {
            writer,
            fields,
            rows: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RowSink for JsonSink<W> {
    fn push(&mut self, row: Row) -> SqlCraftResult<()> {
        self.rows.push(row.select(&self.fields));
        Ok(())
    }

    fn finish(&mut self) -> SqlCraftResult<()> {
        serde_json::to_writer_pretty(&mut self.writer, &self.rows).map_err(io::Error::from)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// A YAML sequence of mappings.
pub struct YamlSink<W> {
    writer: W,
    fields: Vec<String>,
    rows: Vec<Row>,
}

impl<W: Write + Send> YamlSink<W> {
    pub fn new(writer: W, fields: Vec<String>) -> Self {
        Self {
            writer,
            fields,
            rows: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RowSink for YamlSink<W> {
    fn push(&mut self, row: Row) -> SqlCraftResult<()> {
        self.rows.push(row.select(&self.fields));
        Ok(())
    }

    fn finish(&mut self) -> SqlCraftResult<()> {
        let text = serde_yaml::to_string(&self.rows).map_err(io::Error::other)?;
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Comma-separated values, streamed row by row. The header comes from the
/// first row.
pub struct CsvSink<W> {
    writer: W,
    fields: Vec<String>,
    columns: Option<Vec<String>>,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(writer: W, fields: Vec<String>) -> Self {
        Self {
            writer,
            fields,
            columns: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record<'a>(&mut self, cells: impl Iterator<Item = &'a str>) -> io::Result<()> {
        let line: Vec<String> = cells.map(csv_field).collect();
        writeln!(self.writer, "{}", line.join(","))
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

impl<W: Write + Send> RowSink for CsvSink<W> {
    fn push(&mut self, row: Row) -> SqlCraftResult<()> {
        let row = row.select(&self.fields);
        let columns = match self.columns.take() {
            Some(columns) => columns,
            None => {
                let columns: Vec<String> = row.column_names().map(str::to_string).collect();
                self.write_record(columns.iter().map(String::as_str))?;
                columns
            }
        };
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(c) {
                Some(serde_json::Value::Null) | None => String::new(),
                Some(value) => cell_text(value),
            })
            .collect();
        self.write_record(cells.iter().map(String::as_str))?;
        self.columns = Some(columns);
        Ok(())
    }

    fn finish(&mut self) -> SqlCraftResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
