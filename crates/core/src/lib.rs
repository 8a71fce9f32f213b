pub mod account;
pub mod money;
pub mod period;
pub mod render;
pub mod transaction;

pub use account::{LedgerError, REVIEW_TAG, UNCATEGORIZED_ACCOUNT};
pub use money::Amount;
pub use period::{next_day, LedgerYear};
pub use render::{quote, render_entries};
pub use transaction::{
    sort_entries, Balance, Directive, Flag, Meta, Open, Posting, SortKey, Transaction,
};
