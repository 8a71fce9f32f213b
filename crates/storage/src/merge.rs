use beanport_core::LedgerYear;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{io_error, StorageError};
use crate::reader::{self, SourceBlock};

/// What one merge appended, per year file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub appended: BTreeMap<LedgerYear, usize>,
    /// Year files that did not exist before this merge.
    pub created: Vec<PathBuf>,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.appended.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.appended.is_empty()
    }
}

/// Move the entries of `staging_file` into `<ledger_dir>/<year>.bean` files
/// and empty the staging file.
///
/// Each entry is appended as it is written in the staging file, so costs,
/// prices, metadata and directive kinds the reader does not model survive.
/// A staging file with unreadable directives is left untouched.
pub fn merge_staging(staging_file: &Path, ledger_dir: &Path) -> Result<MergeReport, StorageError> {
    if !staging_file.is_file() {
        return Err(StorageError::Configuration(format!(
            "staging file '{}' not found",
            staging_file.display()
        )));
    }
    if !ledger_dir.is_dir() {
        return Err(StorageError::Configuration(format!(
            "ledger directory '{}' not found",
            ledger_dir.display()
        )));
    }

    tracing::info!(file = %staging_file.display(), "Loading staged entries");
    let content = fs::read_to_string(staging_file).map_err(io_error(staging_file))?;
    let parsed = reader::parse_str(&content, &staging_file.display().to_string());
    if let Some(error) = parsed.errors.into_iter().next() {
        tracing::error!(%error, "Staging file has unreadable entries, not merging");
        return Err(error);
    }

    let mut report = MergeReport::default();
    let blocks = reader::dated_blocks(&content);
    if blocks.is_empty() {
        tracing::info!("No entries found in staging file");
        return Ok(report);
    }

    let mut by_year: BTreeMap<LedgerYear, Vec<SourceBlock>> = BTreeMap::new();
    for block in blocks {
        by_year.entry(LedgerYear::of(block.date)).or_default().push(block);
    }

    for (year, blocks) in &by_year {
        let path = ledger_dir.join(year.file_name());
        append_year(&path, *year, blocks, &mut report)?;
        report.appended.insert(*year, blocks.len());
    }

    fs::write(staging_file, "").map_err(io_error(staging_file))?;
    tracing::info!(entries = report.total(), years = report.appended.len(), "Merge complete, staging cleared");
    Ok(report)
}

fn append_year(
    path: &Path,
    year: LedgerYear,
    blocks: &[SourceBlock],
    report: &mut MergeReport,
) -> Result<(), StorageError> {
    let fresh = !path.exists();
    let mut content = String::new();
    if fresh {
        tracing::info!(file = %path.display(), "Creating new ledger file");
        content.push_str(&year.header());
        report.created.push(path.to_path_buf());
    }
    for block in blocks {
        content.push_str(&block.text);
        content.push('\n');
    }

    tracing::info!(file = %path.display(), entries = blocks.len(), "Appending entries");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error(path))?;
    file.write_all(content.as_bytes()).map_err(io_error(path))?;
    Ok(())
}
