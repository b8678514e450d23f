use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use doc_shredder::compare::ensure_same_schema;
use doc_shredder::config::{self, Config, Dialect, LoggingConfig};
use doc_shredder::document::load_document;
use doc_shredder::utils::logging::init_logging;
use doc_shredder::Shredder;

#[derive(Parser)]
#[command(name = "doc_shredder")]
#[command(about = "Normalize YAML/JSON documents into relational tables and compare them")]
#[command(version)]
struct Cli {
    #[arg(long, short, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the log level (trace, debug, info, warn, error)")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Classify document nodes and list table candidates")]
    Analyze {
        #[arg(help = "Path to the YAML or JSON document")]
        input: PathBuf,
    },
    #[command(about = "Flatten a document into tables and print them as JSON")]
    Tables {
        #[arg(help = "Path to the YAML or JSON document")]
        input: PathBuf,
        #[arg(long, help = "Levels of nested mappings to flatten (unlimited when omitted)")]
        max_depth: Option<usize>,
        #[arg(long, help = "Merge identical rows in non-root tables")]
        dedup: bool,
    },
    #[command(about = "Emit CREATE TABLE statements for a document")]
    Ddl {
        #[arg(help = "Path to the YAML or JSON document")]
        input: PathBuf,
        #[arg(long, short, help = "SQL dialect: snowflake, postgres, mysql or sqlite")]
        dialect: Option<String>,
        #[arg(long, help = "Levels of nested mappings to flatten (unlimited when omitted)")]
        max_depth: Option<usize>,
        #[arg(long, short, value_name = "PATH", help = "Write the script to this file")]
        output: Option<PathBuf>,
    },
    #[command(about = "Compare two documents table by table")]
    Compare {
        #[arg(help = "Path to the first (base) document")]
        first: PathBuf,
        #[arg(help = "Path to the second (changed) document")]
        second: PathBuf,
        #[arg(long, value_name = "ROWS", help = "Cap on enumerated row differences per table")]
        row_limit: Option<usize>,
        #[arg(long, value_name = "TABLE=COLUMN", help = "Key column for a table, repeatable")]
        key: Vec<String>,
        #[arg(long, help = "Fail unless both documents have the same structure")]
        strict_schema: bool,
        #[arg(long, short, value_name = "PATH", help = "Write the JSON report to this file")]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => config::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(level) = cli.log_level {
        let logging = config.logging.get_or_insert_with(|| LoggingConfig {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            stdout: false,
        });
        logging.level = level;
    }
    init_logging(&config.logging).context("initializing logging")?;

    match cli.command {
        Commands::Analyze { input } => {
            let document = load(&input)?;
            let analysis = Shredder::new(config).analyze(&document)?;
            print_json(&analysis, None)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tables {
            input,
            max_depth,
            dedup,
        } => {
            if max_depth.is_some() {
                config.generation.max_depth = max_depth;
            }
            config.generation.dedup_enabled |= dedup;

            let document = load(&input)?;
            let tables = Shredder::new(config).generate_tables(&document)?;
            print_json(&tables, None)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ddl {
            input,
            dialect,
            max_depth,
            output,
        } => {
            if let Some(dialect) = dialect {
                config.ddl.dialect = dialect.parse::<Dialect>()?;
            }
            if max_depth.is_some() {
                config.generation.max_depth = max_depth;
            }

            let (_, script) = Shredder::new(config)
                .shred_file(&input)
                .with_context(|| format!("shredding {}", input.display()))?;
            write_output(&script, output.as_ref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compare {
            first,
            second,
            row_limit,
            key,
            strict_schema,
            output,
        } => {
            if row_limit.is_some() {
                config.comparison.row_diff_limit_per_table = row_limit;
            }
            for pair in key {
                let (table, column) = pair
                    .split_once('=')
                    .with_context(|| format!("--key expects TABLE=COLUMN, got '{}'", pair))?;
                config
                    .comparison
                    .primary_key_override
                    .insert(table.to_string(), column.to_string());
            }

            let document_a = load(&first)?;
            let document_b = load(&second)?;
            if strict_schema {
                ensure_same_schema(&document_a, &document_b)
                    .with_context(|| format!("{} and {}", first.display(), second.display()))?;
            }
            let report = Shredder::new(config).compare(&document_a, &document_b)?;
            print_json(&report, output.as_ref())?;

            // Same convention as diff(1): 1 when the inputs differ
            Ok(if report.has_differences() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

fn load(path: &PathBuf) -> Result<serde_json::Value> {
    load_document(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, output: Option<&PathBuf>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    write_output(&text, output)
}

fn write_output(text: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => println!("{}", text),
    }
    Ok(())
}
