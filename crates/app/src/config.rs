use anyhow::{Context, Result};
use beanport_import::{FixedColumnStatement, ImportError, Ingestor, RuleTable};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "beanport.toml";

/// Missing or unusable configuration; the CLI exits with the usage code.
#[derive(Debug, Error)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

/// One statement source, turned into a [`FixedColumnStatement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterConfig {
    pub account: String,
    #[serde(default)]
    pub filename_pattern: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub main_file: PathBuf,
    pub accounts_file: PathBuf,
    pub rules_file: PathBuf,
    pub imports_dir: PathBuf,
    pub ledger_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub staging_file: PathBuf,
    pub operating_currency: String,
    /// Also drop transactions that duplicate ones from earlier files of the
    /// same run.
    pub dedupe_within_run: bool,
    pub importers: Vec<ImporterConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_file: PathBuf::from("main.bean"),
            accounts_file: PathBuf::from("accounts.bean"),
            rules_file: PathBuf::from("user_rules.toml"),
            imports_dir: PathBuf::from("imports"),
            ledger_dir: PathBuf::from("ledgers"),
            archive_dir: PathBuf::from("archive"),
            staging_file: PathBuf::from("staging/import.bean"),
            operating_currency: FixedColumnStatement::DEFAULT_CURRENCY.to_string(),
            dedupe_within_run: false,
            importers: Vec::new(),
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parse {}", path.display()))
    }

    /// Resolve the configuration: the file named by `explicit` (which must
    /// exist), else `beanport.toml` in the working directory if present,
    /// else defaults; then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                let path = expand_tilde(path);
                if !path.is_file() {
                    return Err(ConfigError(format!(
                        "config file '{}' not found",
                        path.display()
                    ))
                    .into());
                }
                Self::from_file(&path)?
            }
            None => {
                let local = Path::new(CONFIG_FILE_NAME);
                if local.is_file() {
                    Self::from_file(local)?
                } else {
                    tracing::debug!("No {CONFIG_FILE_NAME}, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var_os(key));
        config.expand_paths();
        Ok(config)
    }

    /// Override paths from `BEANCOUNT_*` variables as returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<OsString>) {
        let fields: [(&str, &mut PathBuf); 7] = [
            ("BEANCOUNT_MAIN_FILE", &mut self.main_file),
            ("BEANCOUNT_ACCOUNTS_FILE", &mut self.accounts_file),
            ("BEANCOUNT_RULES_FILE", &mut self.rules_file),
            ("BEANCOUNT_IMPORTS_DIR", &mut self.imports_dir),
            ("BEANCOUNT_LEDGER_DIR", &mut self.ledger_dir),
            ("BEANCOUNT_ARCHIVE_DIR", &mut self.archive_dir),
            ("BEANCOUNT_STAGING_FILE", &mut self.staging_file),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = PathBuf::from(value);
            }
        }
    }

    pub fn expand_paths(&mut self) {
        for path in [
            &mut self.main_file,
            &mut self.accounts_file,
            &mut self.rules_file,
            &mut self.imports_dir,
            &mut self.ledger_dir,
            &mut self.archive_dir,
            &mut self.staging_file,
        ] {
            *path = expand_tilde(path);
        }
    }

    /// Parsers in configuration order; a bad filename pattern is a
    /// configuration error.
    pub fn parsers(&self) -> Result<Vec<FixedColumnStatement>, ImportError> {
        self.importers
            .iter()
            .map(|importer| {
                let mut parser = FixedColumnStatement::new(&importer.account);
                if let Some(pattern) = &importer.filename_pattern {
                    parser = parser.with_filename_pattern(pattern)?;
                }
                if let Some(currency) = &importer.currency {
                    parser = parser.with_currency(currency);
                }
                Ok(parser)
            })
            .collect()
    }

    pub fn ingestor(&self, rules: RuleTable) -> Result<Ingestor, ImportError> {
        let mut ingestor = Ingestor::new(rules).dedupe_within_run(self.dedupe_within_run);
        for parser in self.parsers()? {
            ingestor.add_parser(Box::new(parser));
        }
        if ingestor.parser_count() == 0 {
            tracing::warn!("No importers configured; every file will be left unmatched");
        }
        Ok(ingestor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.main_file, PathBuf::from("main.bean"));
        assert_eq!(config.rules_file, PathBuf::from("user_rules.toml"));
        assert_eq!(config.staging_file, PathBuf::from("staging/import.bean"));
        assert_eq!(config.operating_currency, "AUD");
        assert!(!config.dedupe_within_run);
        assert!(config.importers.is_empty());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
ledger_dir = "books"
dedupe_within_run = true

[[importers]]
account = "Assets:Checking"
filename_pattern = "checking"

[[importers]]
account = "Assets:Savings"
currency = "NZD"
"#,
        )
        .unwrap();
        assert_eq!(config.ledger_dir, PathBuf::from("books"));
        assert_eq!(config.imports_dir, PathBuf::from("imports"));
        assert!(config.dedupe_within_run);
        assert_eq!(config.importers.len(), 2);
        assert_eq!(config.importers[1].currency.as_deref(), Some("NZD"));
        assert_eq!(config.importers[1].filename_pattern, None);

        let parsers = config.parsers().unwrap();
        assert_eq!(parsers[1].currency(), "NZD");
        assert_eq!(config.ingestor(RuleTable::empty()).unwrap().parser_count(), 2);
    }

    #[test]
    fn env_overrides_paths() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BEANCOUNT_MAIN_FILE", "/books/main.bean"),
            ("BEANCOUNT_STAGING_FILE", "/tmp/stage.bean"),
            ("BEANCOUNT_IMPORTS_DIR", ""),
        ]);
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(OsString::from));
        assert_eq!(config.main_file, PathBuf::from("/books/main.bean"));
        assert_eq!(config.staging_file, PathBuf::from("/tmp/stage.bean"));
        assert_eq!(config.imports_dir, PathBuf::from("imports"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde(Path::new("~/ledgers"));
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(expanded, dirs.home_dir().join("ledgers"));
        }
        assert_eq!(expand_tilde(Path::new("ledgers")), PathBuf::from("ledgers"));
        assert_eq!(expand_tilde(Path::new("/a/~b")), PathBuf::from("/a/~b"));
    }

    #[test]
    fn bad_filename_pattern_is_configuration_error() {
        let config = Config {
            importers: vec![ImporterConfig {
                account: "Assets:Checking".to_string(),
                filename_pattern: Some("(".to_string()),
                currency: None,
            }],
            ..Config::default()
        };
        assert!(config.parsers().unwrap_err().is_configuration());
    }

    #[test]
    fn explicit_missing_config_file_fails() {
        let err = Config::load(Some(Path::new("/no/such/beanport.toml"))).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }
}
