//! sqlcraft: run and compile declarative SQL commands
//!
//! # Usage
//!
//! ```bash
//! # Run a command from a repository directory
//! sqlcraft --repository ./queries run ls-jobs --status done --limit 5
//!
//! # Show the SQL instead of running it
//! sqlcraft run-file ls-jobs.yaml --print-query
//!
//! # Plain SQL with bound parameters
//! sqlcraft query "SELECT * FROM jobs WHERE id = \$1" --bind 42 --db-type sqlite --database jobs.db
//!
//! # Compile a command to Rust
//! sqlcraft codegen ls-jobs.yaml -p jobs -o src/queries
//! ```

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sqlcraft::cli::{build_command, parse_matches};
use sqlcraft::codegen::{DEFAULT_PACKAGE, SqlCommandCodeGenerator, output_path_for};
use sqlcraft::config::Config;
use sqlcraft::engine::SqlxConnectionFactory;
use sqlcraft::output::sink_for;
use sqlcraft::prelude::*;
use sqlcraft::select::{SelectQuery, select_description};

#[derive(Parser)]
#[command(name = "sqlcraft")]
#[command(version)]
#[command(about = "Run, inspect and compile declarative SQL commands", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlcraft --repository ./queries run ls-jobs --limit 5
    sqlcraft run-file ls-jobs.yaml --print-query
    sqlcraft select jobs --where \"status = 'done'\" --output json
    sqlcraft codegen ls-jobs.yaml -p jobs -o src/queries")]
struct Cli {
    /// Configuration file (default: ./sqlcraft.toml, then the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Directory of command documents, in addition to the configured ones
    #[arg(short, long)]
    repository: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command from the repositories
    #[command(disable_help_flag = true)]
    Run {
        /// Command name
        name: String,
        /// Command flags and arguments (see `run NAME --help`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a command from a YAML file
    #[command(disable_help_flag = true)]
    RunFile {
        /// Command document
        file: PathBuf,
        /// Command flags and arguments (see `run-file FILE --help`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a SQL query passed as an argument, or `-` for stdin
    #[command(disable_help_flag = true)]
    Query {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Select rows from a table, or emit the query as a command document
    #[command(disable_help_flag = true)]
    Select {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Generate Rust code for command documents
    Codegen {
        /// Command documents, one command each
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Name of the generated module
        #[arg(short, long, default_value = DEFAULT_PACKAGE)]
        package: String,

        /// Directory for generated files, named after their input
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Output file, only with a single input
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,
    },
    /// List the commands in the repositories
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    init_tracing(cli.log_level.as_deref().or(config.log_level.as_deref()));

    let result = tokio::select! {
        result = dispatch(&cli, &config) => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("interrupted")),
    };
    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Run { name, args } => {
            let cmd = find_command(&repositories(cli, config), name)?;
            run_command(cmd, config, args).await
        }
        Commands::RunFile { file, args } => {
            let mut commands = sqlcraft::load_from_file(file)
                .with_context(|| format!("could not load {}", file.display()))?;
            if commands.len() != 1 {
                bail!(
                    "{} holds {} commands, expected exactly one",
                    file.display(),
                    commands.len()
                );
            }
            run_command(commands.remove(0), config, args).await
        }
        Commands::Query { args } => query(config, args).await,
        Commands::Select { args } => select(config, args).await,
        Commands::Codegen {
            files,
            package,
            output_dir,
            output_file,
        } => codegen(files, package, output_dir, output_file.as_deref()),
        Commands::List => list(&repositories(cli, config)),
    }
}

fn repositories(cli: &Cli, config: &Config) -> Vec<PathBuf> {
    let mut dirs = config.repository_paths();
    dirs.extend(cli.repository.iter().cloned());
    dirs
}

fn load_repositories(dirs: &[PathBuf]) -> Result<Vec<SqlCommand>> {
    let mut commands = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "skipping missing repository");
            continue;
        }
        commands.extend(
            sqlcraft::load_from_directory(dir)
                .with_context(|| format!("could not load repository {}", dir.display()))?,
        );
    }
    Ok(commands)
}

fn find_command(dirs: &[PathBuf], name: &str) -> Result<SqlCommand> {
    load_repositories(dirs)?
        .into_iter()
        .find(|c| c.name() == name)
        .ok_or_else(|| anyhow!("no command named '{}' in the repositories", name))
}

/// Parse `args` against `description`. Help and usage errors exit here.
fn parse_layers(description: &CommandDescription, config: &Config, args: &[String]) -> Result<ParsedLayers> {
    let argv = std::iter::once(description.name.clone()).chain(args.iter().cloned());
    let matches = build_command(description)
        .try_get_matches_from(argv)
        .unwrap_or_else(|e| e.exit());
    Ok(parse_matches(description, config, &matches)?)
}

fn report(outcome: RunOutcome) {
    match outcome {
        RunOutcome::Streamed { rows } => info!(rows, "done"),
        RunOutcome::ExitWithoutOutput { .. } => debug!("printed query"),
    }
}

async fn run_command(cmd: SqlCommand, config: &Config, args: &[String]) -> Result<()> {
    let layers = parse_layers(&cmd.description, config, args)?;
    let cmd = cmd.with_connection_factory(Arc::new(SqlxConnectionFactory));
    let mut sink = sink_for(&layers, io::stdout())?;
    let outcome = cmd
        .run(&layers, sink.as_mut(), &mut io::stdout())
        .await
        .with_context(|| format!("command {} failed", cmd.name()))?;
    report(outcome);
    Ok(())
}

fn query_description() -> Result<CommandDescription> {
    let flags = ParameterCollection::new(vec![
        ParameterDefinition::new("bind", ParameterKind::StringList)
            .with_help("Values for the query's placeholders, in order"),
    ])?;
    let arguments = ParameterCollection::new(vec![
        ParameterDefinition::new("query", ParameterKind::String)
            .with_help("The SQL query to run, or - to read it from stdin")
            .with_required(true),
    ])?;
    Ok(CommandDescription::new("query")
        .with_short("Run a SQL query passed as a CLI argument")
        .with_flags(flags)
        .with_arguments(arguments)
        .with_layers(ParameterLayer::standard()?))
}

/// Numbers and booleans bind as such, anything else as text.
fn parse_binding(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        Value::Integer(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw == "true" {
        Value::Bool(true)
    } else if raw == "false" {
        Value::Bool(false)
    } else {
        Value::from(raw)
    }
}

async fn run_sql(
    description: CommandDescription,
    sql: String,
    layers: &ParsedLayers,
    bindings: &[Value],
) -> Result<()> {
    let cmd = SqlCommand::new(description, sql, BTreeMap::new())?
        .with_connection_factory(Arc::new(SqlxConnectionFactory));
    let mut sink = sink_for(layers, io::stdout())?;
    let outcome = cmd
        .run_raw(layers, bindings, sink.as_mut(), &mut io::stdout())
        .await
        .context("could not run query")?;
    report(outcome);
    Ok(())
}

async fn query(config: &Config, args: &[String]) -> Result<()> {
    let description = query_description()?;
    let layers = parse_layers(&description, config, args)?;
    let values = layers.default_values();

    let mut sql: String = values.extract("query")?;
    if sql == "-" {
        sql.clear();
        io::stdin()
            .read_to_string(&mut sql)
            .context("could not read query from stdin")?;
    }
    let bindings: Vec<Value> = values
        .extract::<Vec<String>>("bind")?
        .iter()
        .map(|b| parse_binding(b))
        .collect();
    run_sql(description, sql, &layers, &bindings).await
}

async fn select(config: &Config, args: &[String]) -> Result<()> {
    let description = select_description()?;
    let layers = parse_layers(&description, config, args)?;
    let values = layers.default_values();
    let select = SelectQuery::from_values(&values)?;

    let create_query: String = values.extract("create-query")?;
    if !create_query.is_empty() {
        print!("{}", select.to_command_yaml(&create_query)?);
        return Ok(());
    }
    run_sql(description, select.to_sql(), &layers, &[]).await
}

fn codegen(files: &[PathBuf], package: &str, output_dir: &Path, output_file: Option<&Path>) -> Result<()> {
    if output_file.is_some() && files.len() > 1 {
        bail!("--output-file can only be used with a single input file");
    }
    let generator = SqlCommandCodeGenerator::new(package);
    for file in files {
        let output = match output_file {
            Some(path) => path.to_path_buf(),
            None => output_path_for(file, output_dir),
        };
        generator
            .generate_file(file, &output)
            .with_context(|| format!("could not generate code for {}", file.display()))?;
        println!("{} {} -> {}", "✓".green(), file.display(), output.display().to_string().cyan());
    }
    Ok(())
}

fn list(dirs: &[PathBuf]) -> Result<()> {
    let commands = load_repositories(dirs)?;
    if commands.is_empty() {
        println!("{}", "(no commands)".dimmed());
        return Ok(());
    }
    let width = commands.iter().map(|c| c.name().len()).max().unwrap_or(0);
    for cmd in &commands {
        let name = format!("{:width$}", cmd.name(), width = width);
        println!("{}  {}", name.cyan().bold(), cmd.description.short);
    }
    Ok(())
}
