use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    /// A required input is missing; aborts the whole run.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Row {line}: expected 4 columns, found {found}")]
    ColumnCount { line: usize, found: usize },
    #[error("Row {line}: invalid date '{value}'")]
    InvalidDate { line: usize, value: String },
    #[error("Row {line}: invalid amount '{value}'")]
    InvalidAmount { line: usize, value: String },
}

impl ImportError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ImportError::Configuration(_))
    }
}
