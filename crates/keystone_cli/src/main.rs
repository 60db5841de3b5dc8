//! Command-line front end for the Keystone entity layer.
//!
//! # Responsibility
//! - Validate JSON records against a kind's rules and schema.
//! - Store and fetch records in a SQLite datastore file.
//!
//! # Invariants
//! - Output is a single JSON document on stdout; diagnostics go to the log.
//! - Exit code is non-zero on errors and on failed validation.

use clap::{Args, Parser, Subcommand};
use keystone_core::model::value::{properties_from_json, properties_to_json};
use keystone_core::{
    core_version, load_rules, validate_fields, CoreConfig, Datastore, Kind, Properties,
    RuleDocument, RuleSet, SchemaRegistry, SqliteDatastore, Value,
};
use log::{info, warn};
use serde_json::json;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "keystone", version, about = "Keystone entity tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a JSON record against the rules declared for its kind
    Validate(RecordArgs),
    /// Validate a JSON record and store it in a SQLite datastore
    Save {
        #[command(flatten)]
        record: RecordArgs,
        /// SQLite database file (created when missing)
        #[arg(long, value_name = "PATH")]
        db: PathBuf,
    },
    /// Print one stored record as JSON
    Get {
        #[arg(long)]
        kind: String,
        /// Identifier as a JSON literal, e.g. `1` or `"abc"`
        #[arg(long)]
        id: String,
        #[arg(long, value_name = "PATH")]
        db: PathBuf,
    },
    /// Print the core version
    Version,
}

#[derive(Args)]
struct RecordArgs {
    /// Entity kind, e.g. `posts`
    #[arg(long)]
    kind: String,
    /// Rules document (.json or .toml); falls back to KEYSTONE_RULES
    #[arg(long, value_name = "PATH")]
    rules: Option<PathBuf>,
    /// Schema document (.json or .toml); falls back to KEYSTONE_SCHEMA
    #[arg(long, value_name = "PATH")]
    schema: Option<PathBuf>,
    /// JSON object holding the record's properties
    record: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CoreConfig::from_env();
    if let Some(dir) = &config.log_dir {
        if let Err(err) = keystone_core::init_logging(&config.log_level, &dir.to_string_lossy()) {
            eprintln!("keystone: logging disabled: {err}");
        }
    }

    match run(cli.command, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("keystone: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command, config: &CoreConfig) -> CliResult<bool> {
    match command {
        Command::Validate(args) => {
            let (properties, report) = check_record(&args, config)?;
            print_json(&json!({
                "kind": args.kind,
                "valid": report.valid,
                "errors": report.errors,
                "record": properties_to_json(&properties),
            }))?;
            Ok(report.valid)
        }
        Command::Save { record, db } => {
            let (properties, report) = check_record(&record, config)?;
            if !report.valid {
                print_json(&json!({"kind": record.kind, "saved": false, "errors": report.errors}))?;
                return Ok(false);
            }
            let store = SqliteDatastore::open(&db)?;
            let kind = Kind::new(record.kind.as_str());
            let assigned = store.put(&kind, &properties)?;
            info!(
                "event=cli_save module=cli status=ok kind={kind} assigned={}",
                assigned.is_some()
            );
            let id = assigned.or_else(|| properties.get("id").cloned());
            print_json(&json!({
                "kind": record.kind,
                "saved": true,
                "id": id.as_ref().map_or(serde_json::Value::Null, Value::to_json),
            }))?;
            Ok(true)
        }
        Command::Get { kind, id, db } => {
            let id = Value::from(serde_json::from_str::<serde_json::Value>(&id)?);
            let store = SqliteDatastore::open(&db)?;
            match store.find(&Kind::new(kind.as_str()), &id)? {
                Some(record) => {
                    print_json(&properties_to_json(&record.properties))?;
                    Ok(true)
                }
                None => {
                    print_json(&serde_json::Value::Null)?;
                    Ok(false)
                }
            }
        }
        Command::Version => {
            print_json(&json!({"keystone_core": core_version()}))?;
            Ok(true)
        }
    }
}

fn check_record(
    args: &RecordArgs,
    config: &CoreConfig,
) -> CliResult<(Properties, keystone_core::ValidationReport)> {
    let raw = std::fs::read_to_string(&args.record)?;
    let properties = properties_from_json(serde_json::from_str(&raw)?)
        .ok_or("record must be a JSON object")?;

    let rules = match args.rules.as_ref().or(config.rules_path.as_ref()) {
        Some(path) => load_rules(path)?,
        None => RuleDocument::default(),
    };
    let compiled = match rules.get(&args.kind) {
        Some(spec) => RuleSet::compile(spec)?,
        None => {
            warn!(
                "event=cli_validate module=cli status=no_rules kind={}",
                args.kind
            );
            RuleSet::default()
        }
    };
    let report = validate_fields(&compiled, |field| properties.get(field).cloned());

    if let Some(path) = args.schema.as_ref().or(config.schema_path.as_ref()) {
        report_undeclared_fields(path, &args.kind, &properties)?;
    }
    Ok((properties, report))
}

fn report_undeclared_fields(path: &Path, kind: &str, properties: &Properties) -> CliResult<()> {
    let schema = SchemaRegistry::load(path)?;
    let Some(entry) = schema.entry(kind) else {
        warn!("event=cli_schema module=cli status=unknown_kind kind={kind}");
        return Ok(());
    };
    for field in properties.keys() {
        if field != "id" && entry.field(field).is_none() {
            warn!("event=cli_schema module=cli status=undeclared_field kind={kind} field={field}");
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
