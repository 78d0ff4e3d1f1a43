//! Rust code generation for SQL commands.
//!
//! [`SqlCommandCodeGenerator::generate`] lowers one [`SqlCommand`] into a
//! self-contained module that renders and runs the same query without
//! loading the YAML document at runtime. The module is emitted in a fixed
//! order:
//!
//! 1. header and imports
//! 2. one constant per query and sub-query
//! 3. the command struct
//! 4. the parameters struct with its value conversions
//! 5. `render_query` / `run_query_into_sink`
//! 6. `run_into_sink`, the entry point honoring `print-query`
//! 7. the constructor
//!
//! Output depends only on the command and the package name.

use convert_case::{Case, Casing};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{load_from_file, SqlCommand};
use crate::error::{SqlCraftError, SqlCraftResult};
use crate::parameters::{ParameterCollection, ParameterDefinition, ParameterKind};
use crate::value::Value;

pub const DEFAULT_PACKAGE: &str = "queries";

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const RESERVED: &[&str] = &["crate", "self", "super", "Self", "_"];

/// Concrete Rust type used for a parameter kind in generated code.
pub fn rust_type_for(kind: &ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Float => "f64",
        ParameterKind::FloatList => "Vec<f64>",
        ParameterKind::Integer => "i64",
        ParameterKind::IntegerList => "Vec<i64>",
        ParameterKind::Bool => "bool",
        ParameterKind::Date => "DateTime<Utc>",
        ParameterKind::String
        | ParameterKind::Choice
        | ParameterKind::StringFromFile
        | ParameterKind::StringFromFiles => "String",
        ParameterKind::StringList
        | ParameterKind::ChoiceList
        | ParameterKind::StringListFromFile
        | ParameterKind::StringListFromFiles => "Vec<String>",
        ParameterKind::KeyValue => "BTreeMap<String, String>",
        ParameterKind::ObjectFromFile => "BTreeMap<String, Value>",
        ParameterKind::ObjectListFromFile | ParameterKind::ObjectListFromFiles => {
            "Vec<BTreeMap<String, Value>>"
        }
        ParameterKind::File => "FileData",
        ParameterKind::FileList => "Vec<FileData>",
        ParameterKind::Unknown(_) => "Value",
    }
}

/// A Rust string literal for `s`: raw when it spans several lines,
/// escaped otherwise.
pub fn smart_quote(s: &str) -> String {
    if !s.contains('\n') || s.contains('\r') {
        return format!("{:?}", s);
    }
    // One more `#` than the longest `"#...` run inside the text.
    let mut longest = 0;
    for (i, _) in s.match_indices('"') {
        let run = s[i + 1..].chars().take_while(|c| *c == '#').count();
        longest = longest.max(run + 1);
    }
    let hashes = "#".repeat(longest);
    format!("r{hashes}\"{s}\"{hashes}")
}

/// A Rust expression of type `Value` reproducing `value`.
pub fn value_literal(value: &Value) -> String {
    match value {
        Value::Null => "Value::Null".to_string(),
        Value::Bool(b) => format!("Value::Bool({})", b),
        Value::Integer(n) => format!("Value::Integer({})", n),
        Value::Float(f) if f.is_nan() => "Value::Float(f64::NAN)".to_string(),
        Value::Float(f) if f.is_infinite() => {
            let sign = if *f < 0.0 { "-" } else { "" };
            format!("Value::Float({}f64::INFINITY)", sign)
        }
        Value::Float(f) => format!("Value::Float({:?})", f),
        Value::String(s) => format!("Value::from({})", smart_quote(s)),
        Value::Date(d) => format!(
            "Value::Date(DateTime::<Utc>::from_timestamp({}, {}).unwrap_or_default())",
            d.timestamp(),
            d.timestamp_subsec_nanos()
        ),
        Value::File(f) => format!(
            "Value::File(FileData::new({}, {}))",
            smart_quote(&f.path),
            smart_quote(&f.content)
        ),
        Value::List(items) => format!(
            "Value::List(vec![{}])",
            items.iter().map(value_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "Value::Object(BTreeMap::from([{}]))",
            map.iter()
                .map(|(k, v)| format!("({:?}.to_string(), {})", k, value_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn kind_literal(kind: &ParameterKind) -> String {
    match kind {
        ParameterKind::Unknown(name) => format!("ParameterKind::Unknown({:?}.to_string())", name),
        known => format!("ParameterKind::{:?}", known),
    }
}

fn codegen_error(message: impl Into<String>) -> SqlCraftError {
    SqlCraftError::Codegen(message.into())
}

fn is_ident(s: &str) -> bool {
    s.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Convert `name` to `case`, treating every non-alphanumeric character as a
/// word break. Fails when the result still isn't an identifier.
fn derive_ident(name: &str, case: Case) -> SqlCraftResult<String> {
    let words: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let ident = words.to_case(case);
    if is_ident(&ident) && ident.chars().any(|c| c.is_ascii_alphanumeric()) {
        Ok(ident)
    } else {
        Err(codegen_error(format!("cannot derive a Rust identifier from '{}'", name)))
    }
}

/// A snake_case identifier usable as a struct field or module name.
fn field_ident(name: &str) -> SqlCraftResult<String> {
    let ident = derive_ident(name, Case::Snake)?;
    if RESERVED.contains(&ident.as_str()) {
        return Ok(format!("{}_", ident));
    }
    if KEYWORDS.contains(&ident.as_str()) {
        return Ok(format!("r#{}", ident));
    }
    Ok(ident)
}

/// Generates Rust modules from SQL commands.
#[derive(Debug, Clone)]
pub struct SqlCommandCodeGenerator {
    pub package_name: String,
}

impl Default for SqlCommandCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE)
    }
}

struct Names {
    command: String,
    struct_name: String,
    params_name: String,
    query_const: String,
    sub_query_consts: Vec<(String, String)>,
}

impl Names {
    fn for_command(cmd: &SqlCommand) -> SqlCraftResult<Self> {
        let command = cmd.name().to_string();
        let prefix = derive_ident(&command, Case::Constant)?;
        let pascal = derive_ident(&command, Case::Pascal)?;

        let mut seen = BTreeSet::new();
        let mut sub_query_consts = Vec::new();
        for name in cmd.sub_queries.keys() {
            let ident = format!(
                "{}_COMMAND_SUB_QUERY_{}",
                prefix,
                derive_ident(name, Case::Constant)?
            );
            if !seen.insert(ident.clone()) {
                return Err(codegen_error(format!(
                    "sub-query '{}' collides with another sub-query as {}",
                    name, ident
                )));
            }
            sub_query_consts.push((name.clone(), ident));
        }

        Ok(Self {
            struct_name: format!("{}Command", pascal),
            params_name: format!("{}CommandParameters", pascal),
            query_const: format!("{}_COMMAND_QUERY", prefix),
            sub_query_consts,
            command,
        })
    }
}

impl SqlCommandCodeGenerator {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
        }
    }

    /// Generate the module source for `cmd`.
    pub fn generate(&self, cmd: &SqlCommand) -> SqlCraftResult<String> {
        if !cmd.is_valid() {
            return Err(SqlCraftError::InvalidCommand {
                name: cmd.name().to_string(),
                missing: cmd.missing_fields(),
            });
        }
        let package = field_ident(&self.package_name)?;
        let names = Names::for_command(cmd)?;

        let mut out = String::new();
        self.define_header(&mut out, &package, &names)?;
        self.define_constants(&mut out, cmd, &names)?;
        self.define_struct(&mut out, &names)?;
        self.define_parameters_struct(&mut out, cmd, &names)?;
        self.define_run_query_method(&mut out, &names)?;
        self.define_run_into_sink_method(&mut out, &names)?;
        self.define_new_function(&mut out, cmd, &names)?;
        writeln!(out, "}}")?;
        debug!(command = %names.command, bytes = out.len(), "generated code");
        Ok(out)
    }

    fn define_header(&self, out: &mut String, package: &str, names: &Names) -> SqlCraftResult<()> {
        writeln!(out, "// Code generated by sqlcraft from command `{}`. DO NOT EDIT.", names.command)?;
        writeln!(out)?;
        writeln!(out, "pub mod {} {{", package)?;
        writeln!(out, "    #![allow(unused_imports, unused_mut, dead_code)]")?;
        writeln!(out)?;
        writeln!(out, "    use std::collections::BTreeMap;")?;
        writeln!(out, "    use std::io::Write;")?;
        writeln!(out)?;
        writeln!(out, "    use sqlcraft::chrono::{{DateTime, Utc}};")?;
        writeln!(out, "    use sqlcraft::prelude::*;")?;
        writeln!(out)?;
        Ok(())
    }

    fn define_constants(&self, out: &mut String, cmd: &SqlCommand, names: &Names) -> SqlCraftResult<()> {
        writeln!(out, "    pub const {}: &str = {};", names.query_const, smart_quote(&cmd.query))?;
        for (name, ident) in &names.sub_query_consts {
            let text = cmd.sub_queries.get(name).map(String::as_str).unwrap_or_default();
            writeln!(out, "    pub const {}: &str = {};", ident, smart_quote(text))?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn define_struct(&self, out: &mut String, names: &Names) -> SqlCraftResult<()> {
        writeln!(out, "    pub struct {} {{", names.struct_name)?;
        writeln!(out, "        pub description: CommandDescription,")?;
        writeln!(out, "        pub query: String,")?;
        writeln!(out, "        pub sub_queries: BTreeMap<String, String>,")?;
        writeln!(out, "        pub connection: Option<Box<dyn Connection>>,")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        Ok(())
    }

    fn define_parameters_struct(
        &self,
        out: &mut String,
        cmd: &SqlCommand,
        names: &Names,
    ) -> SqlCraftResult<()> {
        let mut fields = Vec::new();
        let mut seen = BTreeSet::new();
        for definition in cmd.description.flags.iter().chain(cmd.description.arguments.iter()) {
            let ident = field_ident(&definition.name)?;
            if !seen.insert(ident.clone()) {
                return Err(codegen_error(format!(
                    "parameter '{}' maps to the field name '{}' twice",
                    definition.name, ident
                )));
            }
            fields.push((definition, ident));
        }

        writeln!(out, "    #[derive(Debug, Clone, Default, PartialEq)]")?;
        writeln!(out, "    pub struct {} {{", names.params_name)?;
        for (definition, ident) in &fields {
            writeln!(out, "        pub {}: {},", ident, rust_type_for(&definition.kind))?;
        }
        writeln!(out, "    }}")?;
        writeln!(out)?;

        writeln!(out, "    impl {} {{", names.params_name)?;
        writeln!(out, "        pub fn from_values(values: &ParameterValues) -> SqlCraftResult<Self> {{")?;
        writeln!(out, "            Ok(Self {{")?;
        for (definition, ident) in &fields {
            writeln!(out, "                {}: values.extract({:?})?,", ident, definition.name)?;
        }
        writeln!(out, "            }})")?;
        writeln!(out, "        }}")?;
        writeln!(out)?;
        writeln!(out, "        pub fn to_values(&self) -> ParameterValues {{")?;
        writeln!(out, "            let mut values = ParameterValues::new();")?;
        for (definition, ident) in &fields {
            writeln!(out, "            values.insert({:?}, self.{}.clone());", definition.name, ident)?;
        }
        writeln!(out, "            values")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        Ok(())
    }

    fn define_run_query_method(&self, out: &mut String, names: &Names) -> SqlCraftResult<()> {
        let (s, p) = (&names.struct_name, &names.params_name);
        writeln!(out, "    impl {} {{", s)?;
        writeln!(out, "        pub fn render_query(&self, dialect: Dialect, params: &{}) -> SqlCraftResult<String> {{", p)?;
        writeln!(out, "            render_query(dialect, &self.query, &self.sub_queries, &params.to_values())")?;
        writeln!(out, "        }}")?;
        writeln!(out)?;
        writeln!(out, "        pub async fn run_query_into_sink(")?;
        writeln!(out, "            &mut self,")?;
        writeln!(out, "            params: &{},", p)?;
        writeln!(out, "            sink: &mut dyn RowSink,")?;
        writeln!(out, "        ) -> SqlCraftResult<usize> {{")?;
        writeln!(out, "            let connection = self.connection.as_mut().ok_or(SqlCraftError::MissingConnection)?;")?;
        writeln!(out, "            let query = render_query(connection.dialect(), &self.query, &self.sub_queries, &params.to_values())?;")?;
        writeln!(out, "            run_query(connection.as_mut(), &query, &[], sink).await")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        Ok(())
    }

    fn define_run_into_sink_method(&self, out: &mut String, names: &Names) -> SqlCraftResult<()> {
        writeln!(out, "    impl {} {{", names.struct_name)?;
        writeln!(out, "        pub async fn run_into_sink(")?;
        writeln!(out, "            &mut self,")?;
        writeln!(out, "            layers: &ParsedLayers,")?;
        writeln!(out, "            sink: &mut dyn RowSink,")?;
        writeln!(out, "            out: &mut (dyn Write + Send),")?;
        writeln!(out, "        ) -> SqlCraftResult<RunOutcome> {{")?;
        writeln!(out, "            let connection = self.connection.as_mut().ok_or(SqlCraftError::MissingConnection)?;")?;
        writeln!(out, "            connection.ping().await?;")?;
        writeln!(out, "            let params = {}::from_values(&layers.merged())?;", names.params_name)?;
        writeln!(out, "            let query = render_query(connection.dialect(), &self.query, &self.sub_queries, &params.to_values())?;")?;
        writeln!(out, "            let query = apply_helpers(layers, query);")?;
        writeln!(out, "            if layers.print_query() {{")?;
        writeln!(out, "                return print_query(out, &query);")?;
        writeln!(out, "            }}")?;
        writeln!(out, "            let rows = run_query(connection.as_mut(), &query, &[], sink).await?;")?;
        writeln!(out, "            Ok(RunOutcome::Streamed {{ rows }})")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        Ok(())
    }

    fn write_definitions(
        &self,
        out: &mut String,
        var: &str,
        collection: &ParameterCollection,
        with_short_flags: bool,
    ) -> SqlCraftResult<()> {
        if collection.is_empty() {
            writeln!(out, "            let {} = ParameterCollection::new(Vec::new())?;", var)?;
            return Ok(());
        }
        writeln!(out, "            let {} = ParameterCollection::new(vec![", var)?;
        for definition in collection {
            self.write_definition(out, definition, with_short_flags)?;
        }
        writeln!(out, "            ])?;")?;
        Ok(())
    }

    fn write_definition(
        &self,
        out: &mut String,
        definition: &ParameterDefinition,
        with_short_flag: bool,
    ) -> SqlCraftResult<()> {
        write!(
            out,
            "                ParameterDefinition::new({:?}, {})",
            definition.name,
            kind_literal(&definition.kind)
        )?;
        write!(out, "\n                    .with_help({})", smart_quote(&definition.help))?;
        if let (true, Some(short)) = (with_short_flag, &definition.short_flag) {
            write!(out, "\n                    .with_short_flag({:?})", short)?;
        }
        if definition.required {
            write!(out, "\n                    .with_required(true)")?;
        }
        if !definition.choices.is_empty() {
            let choices: Vec<String> = definition.choices.iter().map(|c| format!("{:?}", c)).collect();
            write!(out, "\n                    .with_choices([{}])", choices.join(", "))?;
        }
        if let Some(default) = &definition.default {
            write!(out, "\n                    .with_default({})", value_literal(default))?;
        }
        writeln!(out, ",")?;
        Ok(())
    }

    fn define_new_function(&self, out: &mut String, cmd: &SqlCommand, names: &Names) -> SqlCraftResult<()> {
        let description = &cmd.description;
        writeln!(out, "    impl {} {{", names.struct_name)?;
        writeln!(out, "        pub fn new(connection: Box<dyn Connection>) -> SqlCraftResult<Self> {{")?;
        self.write_definitions(out, "flags", &description.flags, true)?;
        self.write_definitions(out, "arguments", &description.arguments, false)?;
        writeln!(out)?;
        writeln!(out, "            let description = CommandDescription::new({:?})", names.command)?;
        writeln!(out, "                .with_short({})", smart_quote(&description.short))?;
        writeln!(out, "                .with_long({})", smart_quote(&description.long))?;
        writeln!(out, "                .with_flags(flags)")?;
        writeln!(out, "                .with_arguments(arguments)")?;
        writeln!(out, "                .with_layers(ParameterLayer::standard()?);")?;
        writeln!(out)?;
        writeln!(out, "            let mut sub_queries = BTreeMap::new();")?;
        for (name, ident) in &names.sub_query_consts {
            writeln!(out, "            sub_queries.insert({:?}.to_string(), {}.to_string());", name, ident)?;
        }
        writeln!(out)?;
        writeln!(out, "            Ok(Self {{")?;
        writeln!(out, "                description,")?;
        writeln!(out, "                query: {}.to_string(),", names.query_const)?;
        writeln!(out, "                sub_queries,")?;
        writeln!(out, "                connection: Some(connection),")?;
        writeln!(out, "            }})")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        Ok(())
    }

    /// Generate code for the single command in `input` and write it to
    /// `output`. Nothing is written unless generation succeeds.
    pub fn generate_file(&self, input: &Path, output: &Path) -> SqlCraftResult<()> {
        let commands = load_from_file(input)?;
        let [command] = commands.as_slice() else {
            return Err(SqlCraftError::CommandCount(commands.len()));
        };
        let code = self.generate(command)?;
        write_atomically(output, &code)?;
        info!(input = %input.display(), output = %output.display(), "wrote generated code");
        Ok(())
    }
}

/// `<dir>/<input stem>.rs`, with the stem snake-cased.
pub fn output_path_for(input: &Path, dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("command")
        .to_case(Case::Snake);
    dir.join(format!("{}.rs", stem))
}

fn write_atomically(path: &Path, contents: &str) -> SqlCraftResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| codegen_error(format!("invalid output path {}", path.display())))?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    if let Err(e) = fs::write(&tmp, contents).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
