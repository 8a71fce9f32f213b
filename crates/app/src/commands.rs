use anyhow::{Context, Result};
use beanport_core::Transaction;
use beanport_import::{ArchiveDecision, IngestReport, RuleTable};
use beanport_storage::{self as storage, MergeReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::Config;

/// Transactions already committed to the main ledger. A missing ledger is
/// treated as empty so a fresh setup can ingest.
pub fn existing_transactions(main_file: &Path) -> Result<Vec<Transaction>> {
    if !main_file.is_file() {
        tracing::warn!(file = %main_file.display(), "Main ledger not found, deduplicating against nothing");
        return Ok(Vec::new());
    }
    let ledger = storage::load_file(main_file)
        .with_context(|| format!("load ledger {}", main_file.display()))?;
    if !ledger.errors.is_empty() {
        tracing::warn!(
            file = %main_file.display(),
            errors = ledger.errors.len(),
            "Ledger has unreadable entries, deduplicating against the rest"
        );
    }
    let transactions = ledger.transactions();
    tracing::info!(
        file = %main_file.display(),
        files = ledger.files.len(),
        transactions = transactions.len(),
        "Loaded existing ledger"
    );
    Ok(transactions)
}

/// Extract every recognised statement under `imports_dir`, drop duplicates
/// of the main ledger and write the survivors to the staging file.
pub fn ingest(config: &Config) -> Result<IngestReport> {
    let rules = RuleTable::load(&config.rules_file)
        .with_context(|| format!("load rules {}", config.rules_file.display()))?;
    let ingestor = config.ingestor(rules)?;
    let existing = existing_transactions(&config.main_file)?;

    let report = ingestor.run(&config.imports_dir, &existing)?;
    storage::write_entries(&config.staging_file, &report.entries)?;
    tracing::info!(
        transactions = report.transaction_count(),
        duplicates = report.duplicate_count(),
        staging = %config.staging_file.display(),
        "Ingest complete"
    );
    Ok(report)
}

pub fn merge(config: &Config) -> Result<MergeReport> {
    Ok(storage::merge_staging(&config.staging_file, &config.ledger_dir)?)
}

/// Result of handling one file during `archive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Moved { source: PathBuf, destination: PathBuf },
    Planned { source: PathBuf, destination: PathBuf },
    Skipped { source: PathBuf, reason: String },
    Failed { source: PathBuf, reason: String },
}

/// Move each recognised statement into `<archive>/<year>/` named by its
/// earliest entry date. With `dry_run` nothing is touched.
pub fn archive(config: &Config, dry_run: bool) -> Result<Vec<ArchiveOutcome>> {
    let ingestor = config.ingestor(RuleTable::empty())?;
    let decisions = ingestor.plan_archives(&config.imports_dir, &config.archive_dir)?;

    if !dry_run && !config.archive_dir.exists() {
        tracing::info!(dir = %config.archive_dir.display(), "Creating archive directory");
        std::fs::create_dir_all(&config.archive_dir)
            .with_context(|| format!("create {}", config.archive_dir.display()))?;
    }

    let timestamp = chrono::Utc::now().timestamp();
    let outcomes = decisions
        .into_iter()
        .map(|decision| match decision {
            ArchiveDecision::Skip { source, reason } => ArchiveOutcome::Skipped { source, reason },
            ArchiveDecision::Move(plan) if dry_run => ArchiveOutcome::Planned {
                source: plan.source,
                destination: plan.destination,
            },
            ArchiveDecision::Move(plan) => {
                match storage::move_file(&plan.source, &plan.destination, || {
                    plan.collision_fallback(timestamp)
                }) {
                    Ok(destination) => ArchiveOutcome::Moved {
                        source: plan.source,
                        destination,
                    },
                    Err(e) => {
                        tracing::warn!(file = %plan.source.display(), error = %e, "Failed to archive");
                        ArchiveOutcome::Failed {
                            source: plan.source,
                            reason: e.to_string(),
                        }
                    }
                }
            }
        })
        .collect();
    Ok(outcomes)
}

/// Write the review ledger and, unless `serve` is false, run fava on it
/// until it exits.
pub fn review(config: &Config, serve: bool) -> Result<PathBuf> {
    let path = storage::write_review_file(
        &config.operating_currency,
        &config.accounts_file,
        &config.staging_file,
    )?;
    if serve {
        tracing::info!(file = %path.display(), "Starting fava");
        let status = Command::new("fava")
            .arg(&path)
            .status()
            .context("launch fava (is it installed and on PATH?)")?;
        if !status.success() {
            tracing::warn!(%status, "fava exited with an error");
        }
    }
    Ok(path)
}

/// One line of the `verify` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: String,
    pub path: PathBuf,
    pub ok: bool,
    pub problem: Option<String>,
}

impl Check {
    fn file(name: &str, path: &Path) -> Self {
        let problem = if !path.exists() {
            Some("does not exist".to_string())
        } else if !path.is_file() {
            Some("is not a file".to_string())
        } else {
            None
        };
        Self::new(name, path, problem)
    }

    fn dir(name: &str, path: &Path) -> Self {
        let problem = if !path.exists() {
            Some("does not exist".to_string())
        } else if !path.is_dir() {
            Some("is not a directory".to_string())
        } else {
            None
        };
        Self::new(name, path, problem)
    }

    fn new(name: &str, path: &Path, problem: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            ok: problem.is_none(),
            problem,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub checks: Vec<Check>,
    /// Rule target accounts with no `open` directive in the main ledger.
    pub unopened_accounts: Vec<String>,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok) && self.unopened_accounts.is_empty()
    }
}

pub fn verify(config: &Config) -> VerifyReport {
    let staging_dir = match config.staging_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut report = VerifyReport {
        checks: vec![
            Check::file("Main Ledger", &config.main_file),
            Check::file("Accounts File", &config.accounts_file),
            Check::file("Rules File", &config.rules_file),
            Check::dir("Imports Dir", &config.imports_dir),
            Check::dir("Ledgers Dir", &config.ledger_dir),
            Check::dir("Archive Dir", &config.archive_dir),
            Check::dir("Staging Dir", &staging_dir),
        ],
        unopened_accounts: Vec::new(),
    };

    let rules = match RuleTable::load(&config.rules_file) {
        Ok(rules) => rules,
        Err(e) => {
            report
                .checks
                .push(Check::new("Rules", &config.rules_file, Some(e.to_string())));
            return report;
        }
    };
    if !config.main_file.is_file() {
        return report;
    }
    match storage::load_file(&config.main_file) {
        Ok(ledger) => {
            if let Some(first) = ledger.errors.first() {
                let detail = match ledger.errors.len() {
                    1 => first.to_string(),
                    n => format!("{first} (and {} more)", n - 1),
                };
                report
                    .checks
                    .push(Check::new("Ledger Syntax", &config.main_file, Some(detail)));
            }
            let opened = ledger.open_accounts();
            report.unopened_accounts = rules
                .accounts()
                .into_iter()
                .filter(|account| !opened.contains(account))
                .map(str::to_string)
                .collect();
        }
        Err(e) => report
            .checks
            .push(Check::new("Ledger Syntax", &config.main_file, Some(e.to_string()))),
    }
    report
}
