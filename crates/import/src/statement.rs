use beanport_core::{
    next_day, sort_entries, Amount, Balance, Directive, Meta, Posting, Transaction,
};
use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::ImportError;
use crate::rules::RuleTable;

/// A bank statement format: recognizes its files and turns them into
/// ledger directives.
pub trait StatementParser {
    /// Human readable name used in logs.
    fn name(&self) -> &str;

    /// The ledger account the statement belongs to.
    fn account(&self) -> &str;

    /// Whether `path` looks like a statement of this format. Never fails:
    /// unreadable or malformed files are simply not recognized.
    fn identify(&self, path: &Path) -> bool;

    /// Parse the whole file. Any malformed row fails the file.
    fn extract(&self, path: &Path, rules: &RuleTable) -> Result<Vec<Directive>, ImportError>;
}

/// Headerless four column export: `date, signed amount, description,
/// running balance`, dates as `DD/MM/YYYY`.
#[derive(Debug, Clone)]
pub struct FixedColumnStatement {
    account: String,
    filename_pattern: Option<Regex>,
    currency: String,
}

impl FixedColumnStatement {
    pub const DEFAULT_CURRENCY: &'static str = "AUD";
    pub const DATE_FORMAT: &'static str = "%d/%m/%Y";
    const COLUMNS: usize = 4;

    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            filename_pattern: None,
            currency: Self::DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Only accept files whose base name contains `pattern` (case-insensitive regex).
    pub fn with_filename_pattern(mut self, pattern: &str) -> Result<Self, ImportError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ImportError::Configuration(format!("invalid filename pattern '{pattern}': {e}"))
            })?;
        self.filename_pattern = Some(regex);
        Ok(self)
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Extension and optional base name pattern check; does not open the file.
    pub fn matches_file_name(&self, path: &Path) -> bool {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return false;
        }
        match &self.filename_pattern {
            Some(re) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| re.is_match(n)),
            None => true,
        }
    }

    /// Content check: the first row has four fields and starts with a date.
    pub fn identify_reader<R: Read>(&self, data: R) -> bool {
        let mut reader = csv_reader(data);
        match reader.records().next() {
            Some(Ok(record)) => {
                record.len() == Self::COLUMNS && parse_date(&record[0]).is_some()
            }
            _ => false,
        }
    }

    /// Parse statement rows into transactions plus one trailing balance
    /// assertion, sorted chronologically.
    pub fn extract_reader<R: Read>(
        &self,
        data: R,
        filename: &str,
        rules: &RuleTable,
    ) -> Result<Vec<Directive>, ImportError> {
        let mut reader = csv_reader(data);
        let mut entries = Vec::new();
        let mut last: Option<(NaiveDate, Decimal)> = None;
        let mut rows = 0;

        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let line = index + 1;

            if record.len() != Self::COLUMNS {
                return Err(ImportError::ColumnCount {
                    line,
                    found: record.len(),
                });
            }

            let date = parse_date(&record[0]).ok_or_else(|| ImportError::InvalidDate {
                line,
                value: record[0].to_string(),
            })?;
            let number = parse_number(&record[1]).ok_or_else(|| ImportError::InvalidAmount {
                line,
                value: record[1].to_string(),
            })?;
            let running_balance =
                parse_number(&record[3]).ok_or_else(|| ImportError::InvalidAmount {
                    line,
                    value: record[3].to_string(),
                })?;

            let narration = record[2].to_string();
            let category = rules.categorize(&narration);
            let units = Amount::new(number, &self.currency);

            entries.push(Directive::Transaction(Transaction {
                meta: Meta::new(filename, index),
                date,
                flag: category.flag,
                payee: None,
                narration,
                tags: category.tags,
                links: BTreeSet::new(),
                postings: vec![
                    Posting::new(&self.account, units.clone()),
                    Posting::new(&category.account, -units),
                ],
            }));

            last = Some((date, running_balance));
            rows = line;
        }

        // The balance holds at the start of the day after the last row.
        if let Some((last_date, running_balance)) = last {
            entries.push(Directive::Balance(Balance {
                meta: Meta::new(filename, rows),
                date: next_day(last_date),
                account: self.account.clone(),
                amount: Amount::new(running_balance, &self.currency),
            }));
        }

        sort_entries(&mut entries);
        Ok(entries)
    }
}

impl StatementParser for FixedColumnStatement {
    fn name(&self) -> &str {
        "fixed-column CSV"
    }

    fn account(&self) -> &str {
        &self.account
    }

    fn identify(&self, path: &Path) -> bool {
        if !self.matches_file_name(path) {
            return false;
        }
        File::open(path)
            .map(|file| self.identify_reader(file))
            .unwrap_or(false)
    }

    fn extract(&self, path: &Path, rules: &RuleTable) -> Result<Vec<Directive>, ImportError> {
        let file = File::open(path)?;
        self.extract_reader(file, &path.display().to_string(), rules)
    }
}

fn csv_reader<R: Read>(data: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), FixedColumnStatement::DATE_FORMAT).ok()
}

/// Exact decimal; thousands separators and spaces are ignored.
fn parse_number(s: &str) -> Option<Decimal> {
    let cleaned = s.replace([',', ' '], "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}
