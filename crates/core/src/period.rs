use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar year a ledger entry is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerYear(pub i32);

impl fmt::Display for LedgerYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LedgerYear {
    pub fn of(date: NaiveDate) -> Self {
        LedgerYear(date.year())
    }

    pub fn year(self) -> i32 {
        self.0
    }

    /// File name of the per-year ledger, e.g. `2026.bean`.
    pub fn file_name(self) -> String {
        format!("{}.bean", self.0)
    }

    /// Comment line a fresh per-year ledger starts with.
    pub fn header(self) -> String {
        format!("; Transactions for {}\n\n", self.0)
    }
}

/// The day after `date`; saturates at the last representable date.
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}
