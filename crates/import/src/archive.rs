//! Where processed statement files end up. Pure path decisions only; the
//! actual move lives in the storage crate.

use beanport_core::{Directive, LedgerYear};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Bucket for files that produced no dated entries.
pub const UNSORTED_DIR: &str = "Unsorted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivePlan {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Earliest entry date, if any.
    pub date: Option<NaiveDate>,
}

impl ArchivePlan {
    fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Alternative destination when `destination` is already taken:
    /// `<YYYY-MM-DD>_<timestamp>_<name>` next to it.
    pub fn collision_fallback(&self, timestamp: i64) -> PathBuf {
        let name = match self.date {
            Some(date) => format!("{date}_{timestamp}_{}", self.file_name()),
            None => format!("{timestamp}_{}", self.file_name()),
        };
        match self.destination.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// `<root>/<year>/<YYYY-MM-DD>_<name>` for the earliest entry date, or
/// `<root>/Unsorted/<name>` when there are no entries.
pub fn plan_archive(archive_root: &Path, source: &Path, entries: &[Directive]) -> ArchivePlan {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match entries.iter().map(Directive::date).min() {
        Some(date) => ArchivePlan {
            source: source.to_path_buf(),
            destination: archive_root
                .join(LedgerYear::of(date).to_string())
                .join(format!("{date}_{file_name}")),
            date: Some(date),
        },
        None => ArchivePlan {
            source: source.to_path_buf(),
            destination: archive_root.join(UNSORTED_DIR).join(file_name),
            date: None,
        },
    }
}

/// What to do with one file found in the imports directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ArchiveDecision {
    Move(ArchivePlan),
    Skip { source: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use beanport_core::{Amount, Balance, Meta};
    use rust_decimal::Decimal;

    fn balance_on(y: i32, m: u32, d: u32) -> Directive {
        Directive::Balance(Balance {
            meta: Meta::default(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            account: "Assets:Test".to_string(),
            amount: Amount::new(Decimal::ONE, "AUD"),
        })
    }

    #[test]
    fn single_entry_goes_under_its_year() {
        let plan = plan_archive(
            Path::new("/archive"),
            Path::new("/imports/checking.csv"),
            &[balance_on(2026, 1, 1)],
        );
        assert_eq!(
            plan.destination,
            PathBuf::from("/archive/2026/2026-01-01_checking.csv")
        );
        assert_eq!(plan.source, PathBuf::from("/imports/checking.csv"));
    }

    #[test]
    fn earliest_date_wins() {
        let plan = plan_archive(
            Path::new("/archive"),
            Path::new("statement.csv"),
            &[balance_on(2026, 2, 1), balance_on(2025, 12, 30), balance_on(2026, 1, 5)],
        );
        assert_eq!(
            plan.destination,
            PathBuf::from("/archive/2025/2025-12-30_statement.csv")
        );
        assert_eq!(plan.date, NaiveDate::from_ymd_opt(2025, 12, 30));
    }

    #[test]
    fn no_entries_goes_to_unsorted() {
        let plan = plan_archive(Path::new("/archive"), Path::new("/in/empty.csv"), &[]);
        assert_eq!(plan.destination, PathBuf::from("/archive/Unsorted/empty.csv"));
        assert_eq!(plan.date, None);
    }

    #[test]
    fn collision_fallback_adds_timestamp() {
        let plan = plan_archive(
            Path::new("/archive"),
            Path::new("checking.csv"),
            &[balance_on(2026, 1, 1)],
        );
        assert_eq!(
            plan.collision_fallback(1767225600),
            PathBuf::from("/archive/2026/2026-01-01_1767225600_checking.csv")
        );

        let unsorted = plan_archive(Path::new("/archive"), Path::new("x.csv"), &[]);
        assert_eq!(
            unsorted.collision_fallback(42),
            PathBuf::from("/archive/Unsorted/42_x.csv")
        );
    }
}
