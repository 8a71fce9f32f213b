use beanport_core::quote;
use std::path::{Path, PathBuf};

use crate::error::{io_error, StorageError};
use crate::writer::write_atomic;

pub const REVIEW_FILE_NAME: &str = "review.bean";

/// Ledger text that shows the staged entries against the account
/// declarations. Includes are absolute so the file can live anywhere.
pub fn review_content(
    operating_currency: &str,
    accounts_file: &Path,
    staging_file: &Path,
) -> Result<String, StorageError> {
    let accounts = std::path::absolute(accounts_file).map_err(io_error(accounts_file))?;
    let staging = std::path::absolute(staging_file).map_err(io_error(staging_file))?;
    Ok(format!(
        "option \"title\" \"Staging Review\"\noption \"operating_currency\" {}\n\ninclude {}\ninclude {}\n",
        quote(operating_currency),
        quote(&accounts.display().to_string()),
        quote(&staging.display().to_string()),
    ))
}

/// Write `review.bean` next to the staging file and return its path.
pub fn write_review_file(
    operating_currency: &str,
    accounts_file: &Path,
    staging_file: &Path,
) -> Result<PathBuf, StorageError> {
    let dir = staging_file.parent().unwrap_or_else(|| Path::new(""));
    let path = dir.join(REVIEW_FILE_NAME);
    let content = review_content(operating_currency, accounts_file, staging_file)?;
    write_atomic(&path, &content)?;
    tracing::info!(path = %path.display(), "Generated review configuration");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    #[test]
    fn review_file_includes_accounts_and_staging() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = dir.path().join("accounts.bean");
        let staging = dir.path().join("staging/import.bean");
        std::fs::write(&accounts, "2020-01-01 open Assets:Test AUD\n").unwrap();
        std::fs::create_dir_all(staging.parent().unwrap()).unwrap();
        std::fs::write(
            &staging,
            "2026-01-01 * \"Lunch\"\n  Assets:Test  -10.00 AUD\n  Expenses:Food\n",
        )
        .unwrap();

        let path = write_review_file("AUD", &accounts, &staging).unwrap();
        assert_eq!(path, dir.path().join("staging/review.bean"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("option \"title\" \"Staging Review\"\n"));
        assert!(content.contains("option \"operating_currency\" \"AUD\""));

        let ledger = reader::load_file(&path).unwrap();
        assert_eq!(ledger.files.len(), 3);
        assert_eq!(ledger.transactions().len(), 1);
        assert!(ledger.open_accounts().contains("Assets:Test"));
    }
}
