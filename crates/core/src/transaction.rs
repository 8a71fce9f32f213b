use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::account::LedgerError;
use super::money::Amount;

/// Transaction flag as written in the ledger: `*` for settled entries,
/// `!` for entries that still need a human to look at them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flag {
    Okay,
    Warning,
}

impl Flag {
    pub fn as_char(self) -> char {
        match self {
            Flag::Okay => '*',
            Flag::Warning => '!',
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "*" | "txn" => Some(Flag::Okay),
            "!" => Some(Flag::Warning),
            _ => None,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Where a directive came from: source file and zero-based line/row index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meta {
    pub filename: String,
    pub lineno: usize,
}

impl Meta {
    pub fn new(filename: impl Into<String>, lineno: usize) -> Self {
        Meta {
            filename: filename.into(),
            lineno,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account: String,
    /// `None` when the amount is left for the ledger to interpolate.
    pub units: Option<Amount>,
}

impl Posting {
    pub fn new(account: &str, units: Amount) -> Self {
        Posting {
            account: account.to_string(),
            units: Some(units),
        }
    }

    pub fn elided(account: &str) -> Self {
        Posting {
            account: account.to_string(),
            units: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub meta: Meta,
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: String,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub postings: Vec<Posting>,
}

impl Transaction {
    pub fn needs_review(&self) -> bool {
        self.flag == Flag::Warning
    }

    /// Checks the two-leg zero-sum shape produced by statement imports.
    pub fn check_balanced(&self) -> Result<(), LedgerError> {
        let [first, second] = self.postings.as_slice() else {
            return Err(LedgerError::PostingCount(self.postings.len()));
        };
        let a = first
            .units
            .as_ref()
            .ok_or_else(|| LedgerError::MissingUnits(first.account.clone()))?;
        let b = second
            .units
            .as_ref()
            .ok_or_else(|| LedgerError::MissingUnits(second.account.clone()))?;

        if a.currency != b.currency {
            return Err(LedgerError::CurrencyMismatch(
                a.currency.clone(),
                b.currency.clone(),
            ));
        }
        if !(a.number + b.number).is_zero() {
            return Err(LedgerError::Unbalanced(a.clone(), b.clone()));
        }
        Ok(())
    }
}

/// Asserts the balance of `account` at the start of `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub meta: Meta,
    pub date: NaiveDate,
    pub account: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Open {
    pub meta: Meta,
    pub date: NaiveDate,
    pub account: String,
    pub currencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    Open(Open),
    Balance(Balance),
    Transaction(Transaction),
}

/// `(date, kind order, line)`; see [`Directive::sort_key`].
pub type SortKey = (NaiveDate, i8, usize);

impl Directive {
    pub fn date(&self) -> NaiveDate {
        match self {
            Directive::Open(o) => o.date,
            Directive::Balance(b) => b.date,
            Directive::Transaction(t) => t.date,
        }
    }

    pub fn meta(&self) -> &Meta {
        match self {
            Directive::Open(o) => &o.meta,
            Directive::Balance(b) => &b.meta,
            Directive::Transaction(t) => &t.meta,
        }
    }

    /// Opens sort before balances, and balances before transactions, on the
    /// same day: a balance asserts the amount at the start of its date.
    pub fn kind_order(&self) -> i8 {
        match self {
            Directive::Open(_) => -2,
            Directive::Balance(_) => -1,
            Directive::Transaction(_) => 0,
        }
    }

    pub fn sort_key(&self) -> SortKey {
        (self.date(), self.kind_order(), self.meta().lineno)
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Directive::Transaction(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Transaction> for Directive {
    fn from(t: Transaction) -> Self {
        Directive::Transaction(t)
    }
}

impl From<Balance> for Directive {
    fn from(b: Balance) -> Self {
        Directive::Balance(b)
    }
}

impl From<Open> for Directive {
    fn from(o: Open) -> Self {
        Directive::Open(o)
    }
}

/// Chronological sort. Stable, so entries tied on the key keep their
/// relative order (file discovery order, then row order).
pub fn sort_entries(entries: &mut [Directive]) {
    entries.sort_by_key(Directive::sort_key);
}
