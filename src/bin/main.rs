//! orql CLI - Compile object queries to SQL
//!
//! Usage:
//!   orql compile <query> [--model <file>] [--format <format>] [--secondary-join <policy>]
//!   orql split <query> [--model <file>]
//!   orql check-model <file>
//!
//! Examples:
//!   orql compile "from Account a where a.id = :id" --model bank.toml
//!   orql compile "select o from Order o where o.items[0].id = 1234" --format json
//!   orql check-model bank.toml
//!
//! Settings come from orql.toml (see `orql::config`); `ORQL_LOG` overrides
//! the configured log filter.

use clap::{Parser, Subcommand, ValueEnum};
use orql::compile::{compile, interpret, CompileError};
use orql::config::Settings;
use orql::metadata::{InMemoryMetadata, MetadataProvider};
use orql::parse::Diagnostic;
use orql::semantic::split;
use orql::sql::{convert, SecondaryTableJoinPolicy};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orql")]
#[command(about = "orql - Compile object queries over mapped entities to SQL")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ORQL_CONFIG, ./orql.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query to SQL
    Compile {
        /// The query text
        query: String,

        /// Model file (overrides [metadata] model)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        format: OutputFormat,

        /// Join type for secondary tables (overrides [sql] secondary_table_join)
        #[arg(long)]
        secondary_join: Option<PolicyArg>,
    },

    /// Show how a query over a polymorphic type splits per implementor
    Split {
        /// The query text
        query: String,

        /// Model file (overrides [metadata] model)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Validate a model file and list its entities
    CheckModel {
        /// Path to the model file (.toml or .json)
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output query plans (SQL plus parameter binders) as JSON
    Json,
}

#[derive(Clone, ValueEnum)]
enum PolicyArg {
    Outer,
    Inner,
    Mapped,
}

impl From<PolicyArg> for SecondaryTableJoinPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Outer => SecondaryTableJoinPolicy::Outer,
            PolicyArg::Inner => SecondaryTableJoinPolicy::Inner,
            PolicyArg::Mapped => SecondaryTableJoinPolicy::Mapped,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.logging.level);

    match cli.command {
        Commands::Compile {
            query,
            model,
            format,
            secondary_join,
        } => cmd_compile(&settings, &query, model, format, secondary_join),
        Commands::Split { query, model } => cmd_split(&settings, &query, model),
        Commands::CheckModel { file } => cmd_check_model(&file),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env("ORQL_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_model(settings: &Settings, model: Option<PathBuf>) -> Result<InMemoryMetadata, String> {
    let path = match model {
        Some(path) => path,
        None => settings
            .metadata
            .resolved_model()
            .map_err(|e| format!("Configuration error: {}", e))?
            .ok_or_else(|| "No model file: pass --model or set [metadata] model".to_string())?,
    };
    tracing::debug!(path = %path.display(), "loading model");
    InMemoryMetadata::load(&path)
        .map_err(|e| format!("Error loading model '{}': {}", path.display(), e))
}

fn cmd_compile(
    settings: &Settings,
    query: &str,
    model: Option<PathBuf>,
    format: OutputFormat,
    secondary_join: Option<PolicyArg>,
) -> ExitCode {
    let metadata = match load_model(settings, model) {
        Ok(m) => m,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let mut options = settings.converter_options();
    if let Some(policy) = secondary_join {
        options.secondary_table_join = policy.into();
    }

    let ast = match compile(query, &metadata, &options) {
        Ok(ast) => ast,
        Err(e) => return report_error(query, &e),
    };

    match format {
        OutputFormat::Sql => {
            for sql in ast.sql_statements() {
                println!("{};", sql);
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&ast.query_plans()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing query plans: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

fn cmd_split(settings: &Settings, query: &str, model: Option<PathBuf>) -> ExitCode {
    let metadata = match load_model(settings, model) {
        Ok(m) => m,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let statement = match interpret(query, &metadata) {
        Ok(s) => Arc::new(s),
        Err(e) => return report_error(query, &e),
    };

    let trees = split(Arc::clone(&statement));
    if trees.len() == 1 && Arc::ptr_eq(&trees[0], &statement) {
        println!("-- Not polymorphic: query is used as is");
    }

    let options = settings.converter_options();
    for tree in &trees {
        let entity = tree
            .root_element()
            .map(|root| root.entity.name().to_string())
            .unwrap_or_default();
        println!("-- {}", entity);
        match convert(tree, &metadata, &options) {
            Ok(ast) => {
                for sql in ast.sql_statements() {
                    println!("{};", sql);
                }
            }
            Err(e) => {
                eprintln!("Conversion error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn cmd_check_model(file: &Path) -> ExitCode {
    let metadata = match InMemoryMetadata::load(file) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Validation error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("File: {}", file.display());
    println!();
    println!("Entities:");
    for entity in metadata.entities() {
        let tables = metadata
            .table_shape(&entity.name)
            .map(|shape| {
                shape
                    .tables
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        match &entity.super_type {
            Some(parent) => println!("  - {} extends {} (tables: {})", entity.name, parent, tables),
            None => println!("  - {} (tables: {})", entity.name, tables),
        }
    }

    println!();
    println!("OK: {} is valid", file.display());
    ExitCode::SUCCESS
}

fn report_error(query: &str, error: &CompileError) -> ExitCode {
    match error {
        CompileError::Syntax(diagnostics) => render_diagnostics(query, diagnostics),
        other => eprintln!("{}", other),
    }
    ExitCode::FAILURE
}

fn render_diagnostics(query: &str, diagnostics: &[Diagnostic]) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    for diag in diagnostics {
        let rendered = Report::build(ReportKind::Error, diag.span.clone())
            .with_message(&diag.message)
            .with_label(
                Label::new(diag.span.clone())
                    .with_message(&diag.message)
                    .with_color(Color::Red),
            )
            .finish()
            .eprint(Source::from(query));
        if rendered.is_err() {
            eprintln!("  {}", diag);
        }
    }
}
