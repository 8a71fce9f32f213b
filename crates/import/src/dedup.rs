//! Duplicate detection against transactions already in the ledger.
//!
//! Two transactions are similar when they share a date, the exact same
//! narration, and at least one posting with the same account and units.
//! The posting rule is loose on purpose: re-exports sometimes split the
//! counter leg differently, so one matching leg is enough.

use beanport_core::{Directive, Posting, Transaction};
use chrono::NaiveDate;
use std::collections::HashMap;

fn postings_overlap(a: &[Posting], b: &[Posting]) -> bool {
    a.iter().any(|p| {
        b.iter()
            .any(|q| p.account == q.account && p.units.is_some() && p.units == q.units)
    })
}

pub fn transactions_similar(a: &Transaction, b: &Transaction) -> bool {
    a.date == b.date && a.narration == b.narration && postings_overlap(&a.postings, &b.postings)
}

/// Only transactions can be similar; every other directive kind is unique.
pub fn are_similar(a: &Directive, b: &Directive) -> bool {
    match (a, b) {
        (Directive::Transaction(x), Directive::Transaction(y)) => transactions_similar(x, y),
        _ => false,
    }
}

pub fn is_duplicate(candidate: &Transaction, existing: &[Transaction]) -> bool {
    existing
        .iter()
        .any(|tx| transactions_similar(candidate, tx))
}

/// `(date, narration)` index over known transactions. Answers exactly what
/// [`is_duplicate`] would over the same set without scanning all of it.
#[derive(Debug, Default)]
pub struct DedupIndex {
    by_key: HashMap<(NaiveDate, String), Vec<Vec<Posting>>>,
    len: usize,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut index = Self::new();
        for tx in transactions {
            index.insert(tx);
        }
        index
    }

    pub fn insert(&mut self, tx: &Transaction) {
        self.by_key
            .entry((tx.date, tx.narration.clone()))
            .or_default()
            .push(tx.postings.clone());
        self.len += 1;
    }

    pub fn contains_similar(&self, candidate: &Transaction) -> bool {
        // Keyed lookup needs an owned narration; candidates are few per run.
        self.by_key
            .get(&(candidate.date, candidate.narration.clone()))
            .is_some_and(|groups| {
                groups
                    .iter()
                    .any(|postings| postings_overlap(&candidate.postings, postings))
            })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
