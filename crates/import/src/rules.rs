use beanport_core::{Flag, REVIEW_TAG, UNCATEGORIZED_ACCOUNT};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// A single categorization rule: descriptions matching `pattern` are booked
/// against `account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: String,
    pub account: String,
}

impl Rule {
    pub fn new(pattern: &str, account: &str) -> Self {
        Rule {
            pattern: pattern.to_string(),
            account: account.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse rules TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Outcome of running a description through the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorization {
    pub account: String,
    pub flag: Flag,
    pub tags: BTreeSet<String>,
}

impl Categorization {
    fn matched(account: &str) -> Self {
        Categorization {
            account: account.to_string(),
            flag: Flag::Okay,
            tags: BTreeSet::new(),
        }
    }

    fn uncategorized() -> Self {
        Categorization {
            account: UNCATEGORIZED_ACCOUNT.to_string(),
            flag: Flag::Warning,
            tags: BTreeSet::from([REVIEW_TAG.to_string()]),
        }
    }

    pub fn needs_review(&self) -> bool {
        self.flag == Flag::Warning
    }
}

/// Internal pairing of a rule with its precompiled, case-insensitive regex.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

/// Ordered rule list. The first rule whose pattern is found anywhere in the
/// description wins; evaluation order is exactly the load order.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Deserialize)]
struct RawRule {
    pattern: Option<String>,
    account: Option<String>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| RuleError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    })?;
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a list of `[[rules]]` tables with `pattern` and `account` keys.
    /// Entries missing either key are skipped.
    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        let file: RuleFile = toml::from_str(toml_content)?;
        let mut rules = Vec::with_capacity(file.rules.len());
        for (idx, raw) in file.rules.into_iter().enumerate() {
            match (raw.pattern, raw.account) {
                (Some(pattern), Some(account)) if !pattern.is_empty() && !account.is_empty() => {
                    rules.push(Rule { pattern, account })
                }
                _ => tracing::warn!(index = idx, "Skipping rule without pattern or account"),
            }
        }
        Self::new(rules)
    }

    /// Loads the rule file at `path`. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No rules file, using empty rule table");
            return Ok(Self::empty());
        }
        let content = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), rules = table.len(), "Loaded categorization rules");
        Ok(table)
    }

    pub fn find_matching_rule(&self, description: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|cr| cr.regex.is_match(description))
            .map(|cr| &cr.rule)
    }

    pub fn categorize(&self, description: &str) -> Categorization {
        match self.find_matching_rule(description) {
            Some(rule) => Categorization::matched(&rule.account),
            None => Categorization::uncategorized(),
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|cr| &cr.rule)
    }

    /// Distinct target accounts, sorted.
    pub fn accounts(&self) -> BTreeSet<&str> {
        self.rules().map(|r| r.account.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Free-function form of [`RuleTable::categorize`].
pub fn categorize(description: &str, rules: &RuleTable) -> Categorization {
    rules.categorize(description)
}
