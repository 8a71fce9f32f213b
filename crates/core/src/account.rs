use thiserror::Error;

use super::money::Amount;

/// Account that uncategorized statement lines are booked against.
pub const UNCATEGORIZED_ACCOUNT: &str = "Expenses:Uncategorized";

/// Tag attached to entries a human still has to look at.
pub const REVIEW_TAG: &str = "review";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Transaction must have exactly two postings, found {0}")]
    PostingCount(usize),
    #[error("Posting on {0} has no amount")]
    MissingUnits(String),
    #[error("Postings are in different currencies: {0} and {1}")]
    CurrencyMismatch(String, String),
    #[error("Unbalanced transaction: {0} + {1} != 0")]
    Unbalanced(Amount, Amount),
}
