use beanport_core::{sort_entries, Directive, Transaction};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::archive::{plan_archive, ArchiveDecision};
use crate::dedup::DedupIndex;
use crate::error::ImportError;
use crate::rules::RuleTable;
use crate::statement::StatementParser;

/// What happened to one input file during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Imported {
        parser: String,
        account: String,
        extracted: usize,
        duplicates: usize,
    },
    /// A parser matched but the file held no rows.
    Empty { parser: String },
    NoMatch,
    Failed { parser: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Surviving entries, sorted chronologically.
    pub entries: Vec<Directive>,
    pub files: Vec<FileReport>,
}

impl IngestReport {
    pub fn transaction_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Directive::Transaction(_)))
            .count()
    }

    pub fn duplicate_count(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Imported { duplicates, .. } => duplicates,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::NoMatch))
    }
}

/// Runs statement files through the configured parsers, categorizes and
/// drops transactions the ledger already has.
pub struct Ingestor {
    parsers: Vec<Box<dyn StatementParser>>,
    rules: RuleTable,
    dedupe_within_run: bool,
}

impl Ingestor {
    pub fn new(rules: RuleTable) -> Self {
        Self {
            parsers: Vec::new(),
            rules,
            dedupe_within_run: false,
        }
    }

    /// Parsers are tried in the order they were added.
    pub fn with_parser(mut self, parser: impl StatementParser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    pub fn add_parser(&mut self, parser: Box<dyn StatementParser>) {
        self.parsers.push(parser);
    }

    /// Also drop transactions already emitted by an earlier file of the same
    /// run. Rows repeated inside a single file are always kept.
    pub fn dedupe_within_run(mut self, enabled: bool) -> Self {
        self.dedupe_within_run = enabled;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }

    /// First parser that recognizes `path`.
    pub fn identify(&self, path: &Path) -> Option<&dyn StatementParser> {
        self.parsers
            .iter()
            .map(|p| p.as_ref())
            .find(|p| p.identify(path))
    }

    /// Ingest every statement under `input_dir`.
    pub fn run(&self, input_dir: &Path, existing: &[Transaction]) -> Result<IngestReport, ImportError> {
        let files = discover_files(input_dir)?;
        tracing::info!(
            dir = %input_dir.display(),
            files = files.len(),
            existing = existing.len(),
            "Starting ingest"
        );
        Ok(self.ingest_files(&files, existing))
    }

    /// Ingest an explicit list of files. Per-file failures are recorded in
    /// the report and never stop the run.
    pub fn ingest_files(&self, files: &[PathBuf], existing: &[Transaction]) -> IngestReport {
        let ledger = DedupIndex::from_transactions(existing);
        let mut emitted = DedupIndex::new();
        let mut report = IngestReport::default();

        for path in files {
            let Some(parser) = self.identify(path) else {
                tracing::info!(file = %path.display(), "Skipping file, no importer matched");
                report.files.push(FileReport {
                    path: path.clone(),
                    outcome: FileOutcome::NoMatch,
                });
                continue;
            };

            tracing::info!(
                file = %path.display(),
                parser = parser.name(),
                account = parser.account(),
                "Importing"
            );

            let extracted = match parser.extract(path, &self.rules) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to extract, skipping file");
                    report.files.push(FileReport {
                        path: path.clone(),
                        outcome: FileOutcome::Failed {
                            parser: parser.name().to_string(),
                            reason: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            if extracted.is_empty() {
                tracing::info!(file = %path.display(), "Importer matched but no entries extracted");
                report.files.push(FileReport {
                    path: path.clone(),
                    outcome: FileOutcome::Empty {
                        parser: parser.name().to_string(),
                    },
                });
                continue;
            }

            let total = extracted.len();
            let mut kept = Vec::with_capacity(total);
            let mut duplicates = 0;
            for entry in extracted {
                if let Directive::Transaction(tx) = &entry {
                    let seen = ledger.contains_similar(tx)
                        || (self.dedupe_within_run && emitted.contains_similar(tx));
                    if seen {
                        tracing::debug!(date = %tx.date, narration = %tx.narration, "Dropping duplicate");
                        duplicates += 1;
                        continue;
                    }
                }
                kept.push(entry);
            }

            if self.dedupe_within_run {
                for tx in kept.iter().filter_map(Directive::as_transaction) {
                    emitted.insert(tx);
                }
            }

            tracing::info!(
                file = %path.display(),
                extracted = total,
                duplicates,
                "Extracted entries"
            );
            report.files.push(FileReport {
                path: path.clone(),
                outcome: FileOutcome::Imported {
                    parser: parser.name().to_string(),
                    account: parser.account().to_string(),
                    extracted: total,
                    duplicates,
                },
            });
            report.entries.extend(kept);
        }

        sort_entries(&mut report.entries);
        report
    }

    /// Decide where each statement under `imports_dir` should be archived.
    /// Unrecognized files and files that fail to parse stay where they are.
    pub fn plan_archives(
        &self,
        imports_dir: &Path,
        archive_root: &Path,
    ) -> Result<Vec<ArchiveDecision>, ImportError> {
        let files = discover_files(imports_dir)?;
        let mut decisions = Vec::with_capacity(files.len());

        for path in files {
            let Some(parser) = self.identify(&path) else {
                tracing::info!(file = %path.display(), "No importer matched, leaving in place");
                decisions.push(ArchiveDecision::Skip {
                    source: path,
                    reason: "no importer matched".to_string(),
                });
                continue;
            };

            match parser.extract(&path, &self.rules) {
                Ok(entries) => {
                    decisions.push(ArchiveDecision::Move(plan_archive(
                        archive_root,
                        &path,
                        &entries,
                    )));
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Importer matched but failed to extract");
                    decisions.push(ArchiveDecision::Skip {
                        source: path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(decisions)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// All files below `dir` whose name does not start with `.`, sorted by path.
/// Directories are always descended into, hidden or not.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    if !dir.is_dir() {
        return Err(ImportError::Configuration(format!(
            "input directory '{}' not found",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) if current.as_path() == dir => return Err(e.into()),
            Err(e) => {
                tracing::warn!(dir = %current.display(), error = %e, "Cannot read directory, skipping");
                continue;
            }
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() && !is_hidden(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
