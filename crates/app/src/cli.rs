//! CLI definition and dispatch.

use anyhow::Result;
use beanport_import::{FileOutcome, ImportError, RuleError};
use beanport_storage::StorageError;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::commands::{self, ArchiveOutcome};
use crate::config::{expand_tilde, Config, ConfigError};

/// General failure.
pub const EXIT_ERROR: u8 = 1;
/// Missing or invalid configuration: paths, config file, rules.
pub const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "beanport",
    version,
    about = "Import bank statement CSVs into a Beancount ledger"
)]
pub struct Cli {
    /// Config file (default: ./beanport.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract, categorize and deduplicate statements into the staging file
    Ingest {
        /// Directory to scan for statements
        imports_dir: Option<PathBuf>,
        /// Staging file to write
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ledger to deduplicate against
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Print the per-file report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Append staged entries to the per-year ledger files
    Merge {
        staging_file: Option<PathBuf>,
        ledger_dir: Option<PathBuf>,
    },
    /// Move imported statements into the dated archive
    Archive {
        imports_dir: Option<PathBuf>,
        archive_dir: Option<PathBuf>,
        /// Show where files would go without moving them
        #[arg(long)]
        dry_run: bool,
    },
    /// Write the staging review ledger and open it in fava
    Review {
        /// Only write the review file
        #[arg(long)]
        no_serve: bool,
    },
    /// Check that the configured files and directories exist
    Verify,
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn set_path(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(value) = value {
        *target = expand_tilde(&value);
    }
}

/// Whether `err` stems from missing or invalid configuration.
pub fn is_configuration_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<ConfigError>()
            || cause.is::<RuleError>()
            || cause
                .downcast_ref::<ImportError>()
                .is_some_and(ImportError::is_configuration)
            || cause
                .downcast_ref::<StorageError>()
                .is_some_and(StorageError::is_configuration)
    })
}

pub fn run(cli: Cli) -> ExitCode {
    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            if is_configuration_error(&e) {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_ERROR)
            }
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ingest {
            imports_dir,
            output,
            ledger,
            json,
        } => {
            set_path(&mut config.imports_dir, imports_dir);
            set_path(&mut config.staging_file, output);
            set_path(&mut config.main_file, ledger);
            run_ingest(&config, json)
        }
        Command::Merge {
            staging_file,
            ledger_dir,
        } => {
            set_path(&mut config.staging_file, staging_file);
            set_path(&mut config.ledger_dir, ledger_dir);
            run_merge(&config)
        }
        Command::Archive {
            imports_dir,
            archive_dir,
            dry_run,
        } => {
            set_path(&mut config.imports_dir, imports_dir);
            set_path(&mut config.archive_dir, archive_dir);
            run_archive(&config, dry_run)
        }
        Command::Review { no_serve } => {
            let path = commands::review(&config, !no_serve)?;
            println!("Review file: {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify => Ok(run_verify(&config)),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_ingest(config: &Config, json: bool) -> Result<ExitCode> {
    let report = commands::ingest(config)?;
    if json {
        print_json(&report.files)?;
        return Ok(ExitCode::SUCCESS);
    }

    for file in &report.files {
        let path = file.path.display();
        match &file.outcome {
            FileOutcome::Imported {
                parser,
                extracted,
                duplicates,
                ..
            } => println!("{path}: {extracted} entries via {parser}, {duplicates} duplicates"),
            FileOutcome::Empty { parser } => println!("{path}: no entries ({parser})"),
            FileOutcome::NoMatch => println!("{path}: no importer matched"),
            FileOutcome::Failed { parser, reason } => {
                println!("{path}: failed ({parser}): {reason}")
            }
        }
    }
    println!(
        "Staged {} transactions ({} duplicates skipped) in {}",
        report.transaction_count(),
        report.duplicate_count(),
        config.staging_file.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_merge(config: &Config) -> Result<ExitCode> {
    let report = commands::merge(config)?;
    if report.is_empty() {
        println!("No entries found in staging file.");
        return Ok(ExitCode::SUCCESS);
    }
    for (year, count) in &report.appended {
        println!(
            "{count} entries -> {}",
            config.ledger_dir.join(year.file_name()).display()
        );
    }
    println!("Merge complete. Staging file cleared.");
    Ok(ExitCode::SUCCESS)
}

fn run_archive(config: &Config, dry_run: bool) -> Result<ExitCode> {
    for outcome in commands::archive(config, dry_run)? {
        match outcome {
            ArchiveOutcome::Moved {
                source,
                destination,
            } => println!("{} -> {}", source.display(), destination.display()),
            ArchiveOutcome::Planned {
                source,
                destination,
            } => println!("{} -> {} (dry run)", source.display(), destination.display()),
            ArchiveOutcome::Skipped { source, reason } => {
                println!("{}: skipped, {reason}", source.display())
            }
            ArchiveOutcome::Failed { source, reason } => {
                println!("{}: failed, {reason}", source.display())
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_verify(config: &Config) -> ExitCode {
    println!("Verifying environment configuration...\n");
    let report = commands::verify(config);
    for check in &report.checks {
        match &check.problem {
            None => println!("✅ {}: {}", check.name, check.path.display()),
            Some(problem) => println!("❌ {}: '{}' {problem}", check.name, check.path.display()),
        }
    }
    for account in &report.unopened_accounts {
        println!("❌ Rule account '{account}' has no open directive");
    }

    if report.ok() {
        println!("\nConfiguration OK!");
        ExitCode::SUCCESS
    } else {
        println!("\nConfiguration has errors.");
        ExitCode::from(EXIT_ERROR)
    }
}
