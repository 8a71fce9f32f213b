pub mod archive;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod rules;
pub mod statement;

pub use archive::{plan_archive, ArchiveDecision, ArchivePlan, UNSORTED_DIR};
pub use dedup::{are_similar, is_duplicate, transactions_similar, DedupIndex};
pub use error::ImportError;
pub use ingest::{discover_files, FileOutcome, FileReport, IngestReport, Ingestor};
pub use rules::{categorize, Categorization, Rule, RuleError, RuleTable};
pub use statement::{FixedColumnStatement, StatementParser};
