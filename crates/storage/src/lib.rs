pub mod archive;
pub mod error;
pub mod merge;
pub mod reader;
pub mod review;
pub mod writer;

pub use archive::move_file;
pub use error::StorageError;
pub use merge::{merge_staging, MergeReport};
pub use reader::{dated_blocks, load_file, parse_str, Ledger, ParsedFile, SourceBlock};
pub use review::{review_content, write_review_file, REVIEW_FILE_NAME};
pub use writer::{write_atomic, write_entries};
