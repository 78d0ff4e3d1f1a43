//! Command-line surface for loaded commands.
//!
//! Every [`CommandDescription`] becomes a clap subcommand: its flags and the flags
//! of its layers are options, its arguments are positionals. Values are
//! resolved in this order, last wins:
//!
//! 1. parameter defaults
//! 2. the configuration file
//! 3. `SQLCRAFT_<FLAG>` environment variables (connection flags only)
//! 4. the command line

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use convert_case::{Case, Casing};
use std::collections::BTreeSet;
use tracing::warn;

use crate::command::CommandDescription;
use crate::config::Config;
use crate::error::{SqlCraftError, SqlCraftResult};
use crate::layers::{DEFAULT_SLUG, ParsedLayers, SQL_CONNECTION_SLUG};
use crate::parameters::{ParameterDefinition, ParameterKind};
use crate::value::Value;

pub const ENV_PREFIX: &str = "SQLCRAFT_";

/// `SQLCRAFT_DB_TYPE` for `db-type`.
pub fn env_var_for(flag: &str) -> String {
    format!("{}{}", ENV_PREFIX, flag.to_case(Case::Constant))
}

fn splits_on_commas(kind: &ParameterKind) -> bool {
    matches!(
        kind,
        ParameterKind::StringList
            | ParameterKind::ChoiceList
            | ParameterKind::IntegerList
            | ParameterKind::FloatList
            | ParameterKind::KeyValue
    )
}

fn help_text(definition: &ParameterDefinition) -> String {
    match &definition.default {
        Some(default) if !matches!(default, Value::Null) => {
            format!("{} [default: {}]", definition.help, default)
        }
        _ => definition.help.clone(),
    }
}

fn flag_arg(definition: &ParameterDefinition, env: bool) -> Arg {
    let mut arg = Arg::new(definition.name.clone())
        .long(definition.name.clone())
        .help(help_text(definition));

    match definition.short_char() {
        Some('h') => warn!(flag = %definition.name, "short flag -h is reserved for help"),
        Some(c) => arg = arg.short(c),
        None => {}
    }

    if definition.kind == ParameterKind::Bool {
        arg = arg.action(ArgAction::SetTrue);
    } else {
        arg = arg.num_args(1).value_name(definition.kind.as_str().to_uppercase());
        if definition.kind.is_list() {
            arg = arg.action(ArgAction::Append);
        }
        if splits_on_commas(&definition.kind) {
            arg = arg.value_delimiter(',');
        }
        if definition.required && definition.default.is_none() {
            arg = arg.required(true);
        }
    }
    if env {
        arg = arg.env(env_var_for(&definition.name));
    }
    arg
}

fn argument_arg(definition: &ParameterDefinition, index: usize) -> Arg {
    let mut arg = Arg::new(definition.name.clone())
        .index(index)
        .help(help_text(definition))
        .value_name(definition.name.to_case(Case::Constant));
    if definition.kind.is_list() {
        arg = arg.num_args(1..).action(ArgAction::Append);
        if splits_on_commas(&definition.kind) {
            arg = arg.value_delimiter(',');
        }
    }
    if definition.required && definition.default.is_none() {
        arg = arg.required(true);
    }
    arg
}

/// The clap command for a description.
///
/// A layer flag whose name is already taken by the command is left out;
/// the command's own parameter wins, as in [`ParsedLayers::merged`].
pub fn build_command(description: &CommandDescription) -> Command {
    let mut command = Command::new(description.name.clone()).about(description.short.clone());
    if !description.long.is_empty() {
        command = command.long_about(description.long.clone());
    }

    let mut taken = BTreeSet::new();
    for definition in &description.flags {
        taken.insert(definition.name.clone());
        command = command.arg(flag_arg(definition, false));
    }
    let mut index = 0;
    for definition in &description.arguments {
        if !taken.insert(definition.name.clone()) {
            warn!(argument = %definition.name, "argument shadowed by a flag of the same name");
            continue;
        }
        index += 1;
        command = command.arg(argument_arg(definition, index));
    }
    for layer in &description.layers {
        let heading = layer.name.clone();
        for definition in &layer.flags {
            if !taken.insert(definition.name.clone()) {
                continue;
            }
            let env = layer.slug == SQL_CONNECTION_SLUG;
            command = command.arg(flag_arg(definition, env).help_heading(heading.clone()));
        }
    }
    command
}

fn explicit(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

fn read_value(matches: &ArgMatches, definition: &ParameterDefinition) -> SqlCraftResult<Value> {
    if definition.kind == ParameterKind::Bool {
        return Ok(Value::Bool(matches.get_flag(&definition.name)));
    }
    let raw: Vec<String> = matches
        .get_many::<String>(&definition.name)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    definition
        .kind
        .parse_input(&raw, &definition.choices)
        .map_err(|message| SqlCraftError::parameter(&definition.name, message))
}

/// Resolve every parameter of `description` from defaults, `config` and
/// `matches`.
pub fn parse_matches(
    description: &CommandDescription,
    config: &Config,
    matches: &ArgMatches,
) -> SqlCraftResult<ParsedLayers> {
    let mut layers = ParsedLayers::from_defaults(description);
    config.apply(description, &mut layers)?;

    let mut taken = BTreeSet::new();
    for definition in description.flags.iter().chain(description.arguments.iter()) {
        if !taken.insert(definition.name.as_str()) {
            continue;
        }
        if explicit(matches, &definition.name) {
            layers.set(DEFAULT_SLUG, definition.name.clone(), read_value(matches, definition)?);
        }
    }
    for layer in &description.layers {
        for definition in &layer.flags {
            if !taken.insert(definition.name.as_str()) {
                continue;
            }
            if explicit(matches, &definition.name) {
                layers.set(&layer.slug, definition.name.clone(), read_value(matches, definition)?);
            }
        }
    }
    Ok(layers)
}
