//! Reader for the subset of Beancount this workspace produces and consumes:
//! transactions with their postings, `balance`, `open` and `include`.
//! Everything else (options, plugins, comments, metadata, other directive
//! kinds) is skipped.
//!
//! Like the Beancount loader, reading never stops at a bad directive: the
//! error is collected and the rest of the file is still read.

use beanport_core::{Amount, Balance, Directive, Flag, Meta, Open, Posting, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{io_error, StorageError};

/// Entries loaded from a ledger file and everything it includes.
#[derive(Debug, Default)]
pub struct Ledger {
    pub entries: Vec<Directive>,
    /// Every file that contributed entries, the main file first.
    pub files: Vec<PathBuf>,
    /// Directives that could not be read, and unreadable included files.
    pub errors: Vec<StorageError>,
}

impl Ledger {
    pub fn transactions(&self) -> Vec<Transaction> {
        self.entries
            .iter()
            .filter_map(Directive::as_transaction)
            .cloned()
            .collect()
    }

    pub fn open_accounts(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Directive::Open(o) => Some(o.account.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Load `path`, following `include` directives relative to the including
/// file. Include paths may be glob patterns (`ledgers/*.bean`). Includes
/// that match nothing are skipped with a warning; include cycles are
/// ignored. Only a missing or unreadable main file is an error.
pub fn load_file(path: &Path) -> Result<Ledger, StorageError> {
    if !path.is_file() {
        return Err(StorageError::Configuration(format!(
            "ledger file '{}' not found",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    let mut ledger = Ledger::default();
    let mut visited = HashSet::new();
    load_content(path, &content, &mut ledger, &mut visited);
    Ok(ledger)
}

fn load_into(path: &Path, ledger: &mut Ledger, visited: &mut HashSet<PathBuf>) {
    match std::fs::read_to_string(path) {
        Ok(content) => load_content(path, &content, ledger, visited),
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "Cannot read included file");
            ledger.errors.push(io_error(path)(e));
        }
    }
}

fn load_content(path: &Path, content: &str, ledger: &mut Ledger, visited: &mut HashSet<PathBuf>) {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(key) {
        tracing::debug!(file = %path.display(), "Include cycle, skipping");
        return;
    }

    let parsed = parse_str(content, &path.display().to_string());
    for error in &parsed.errors {
        tracing::warn!(%error, "Skipping unreadable directive");
    }
    ledger.files.push(path.to_path_buf());
    ledger.entries.extend(parsed.entries);
    ledger.errors.extend(parsed.errors);

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for include in parsed.includes {
        let targets = resolve_include(base, &include);
        if targets.is_empty() {
            tracing::warn!(file = %path.display(), include = %include, "Included file not found");
        }
        for target in targets {
            load_into(&target, ledger, visited);
        }
    }
}

/// Files an `include` names, relative to `base`. Glob patterns expand to
/// their matches in path order.
fn resolve_include(base: &Path, include: &str) -> Vec<PathBuf> {
    if !include.contains(['*', '?', '[']) {
        let target = base.join(include);
        return if target.is_file() { vec![target] } else { Vec::new() };
    }

    let pattern = if Path::new(include).is_absolute() || base.as_os_str().is_empty() {
        include.to_string()
    } else {
        let escaped = glob::Pattern::escape(&base.to_string_lossy());
        format!("{escaped}/{include}")
    };
    match glob::glob(&pattern) {
        Ok(paths) => {
            let mut matches: Vec<PathBuf> = paths
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();
            matches.sort();
            matches
        }
        Err(e) => {
            tracing::warn!(include = %include, error = %e, "Invalid include pattern");
            Vec::new()
        }
    }
}

/// Directives of a single file, the raw `include` paths it names, and the
/// directives that failed to parse.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub entries: Vec<Directive>,
    pub includes: Vec<String>,
    pub errors: Vec<StorageError>,
}

/// The verbatim text of one dated directive: its first line plus the
/// indented lines (postings, metadata, comments) below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlock {
    pub date: NaiveDate,
    /// 1-based line of the directive.
    pub line: usize,
    pub text: String,
}

#[derive(Debug, PartialEq)]
enum Token {
    Str(String),
    Word(String),
}

/// Splits a directive line into quoted strings and bare words, stopping at
/// a `;` comment.
fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == ';' {
            break;
        } else if c == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            s.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => s.push(c),
                }
            }
            if !closed {
                return Err("unterminated string".to_string());
            }
            tokens.push(Token::Str(s));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}

/// Beancount accepts both `2026-01-31` and `2026/01/31`.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

fn parse_number(s: &str) -> Option<Decimal> {
    Decimal::from_str(&s.replace(',', "")).ok()
}

fn parse_amount(number: Option<&Token>, currency: Option<&Token>) -> Option<Amount> {
    match (number, currency) {
        (Some(Token::Word(n)), Some(Token::Word(c))) => {
            parse_number(n).map(|n| Amount::new(n, c))
        }
        _ => None,
    }
}

struct ParsedPosting {
    posting: Posting,
    /// Carries a `{cost}` or `@ price`, so its weight is not its units.
    priced: bool,
}

fn parse_posting(line: &str) -> Option<ParsedPosting> {
    let tokens = tokenize(line).ok()?;
    let mut words = tokens.iter().peekable();

    // Optional posting flag.
    if let Some(Token::Word(w)) = words.peek() {
        if w == "*" || w == "!" {
            words.next();
        }
    }
    let account = match words.next()? {
        Token::Word(w) => w.clone(),
        Token::Str(_) => return None,
    };
    let units = parse_amount(words.next(), words.next());
    let priced = words.any(|t| matches!(t, Token::Word(w) if w.starts_with(['{', '@'])));
    Some(ParsedPosting {
        posting: Posting { account, units },
        priced,
    })
}

fn is_metadata(trimmed: &str) -> bool {
    trimmed
        .split_whitespace()
        .next()
        .is_some_and(|first| first.ends_with(':') && first.starts_with(|c: char| c.is_ascii_lowercase()))
}

/// Fill a single amount-less posting with the negated sum of the others,
/// the way Beancount interpolates it. Left alone when more than one posting
/// is elided, when currencies are mixed, or when a cost or price is
/// involved.
fn fill_elided_posting(tx: &mut Transaction) {
    let mut elided = tx
        .postings
        .iter()
        .enumerate()
        .filter(|(_, p)| p.units.is_none())
        .map(|(i, _)| i);
    let (Some(index), None) = (elided.next(), elided.next()) else {
        return;
    };

    let mut currency: Option<&str> = None;
    let mut sum = Decimal::ZERO;
    for units in tx.postings.iter().filter_map(|p| p.units.as_ref()) {
        match currency {
            None => currency = Some(&units.currency),
            Some(c) if c == units.currency => {}
            Some(_) => return,
        }
        sum += units.number;
    }
    let Some(currency) = currency.map(str::to_string) else {
        return;
    };
    tx.postings[index].units = Some(Amount::new(-sum, &currency));
}

/// A transaction still collecting its postings.
struct PendingTransaction {
    tx: Transaction,
    priced: bool,
}

impl PendingTransaction {
    fn finish(mut self) -> Directive {
        if !self.priced {
            fill_elided_posting(&mut self.tx);
        }
        Directive::Transaction(self.tx)
    }
}

enum Parsed {
    Include(String),
    Entry(Directive),
    Transaction(PendingTransaction),
    Skipped,
}

fn parse_header(tokens: Vec<Token>, filename: &str, index: usize) -> Result<Parsed, String> {
    let mut it = tokens.into_iter();
    let Some(Token::Word(first)) = it.next() else {
        return Ok(Parsed::Skipped);
    };

    if first == "include" {
        return match it.next() {
            Some(Token::Str(target)) => Ok(Parsed::Include(target)),
            _ => Err("include needs a quoted path".to_string()),
        };
    }
    if !first.starts_with(|c: char| c.is_ascii_digit()) {
        // option, plugin, pushtag, org-mode headers, ...
        return Ok(Parsed::Skipped);
    }

    let date = parse_date(&first).ok_or_else(|| format!("invalid date '{first}'"))?;
    let meta = Meta::new(filename, index);
    let rest: Vec<Token> = it.collect();
    let keyword = match rest.first() {
        Some(Token::Word(w)) => w.as_str(),
        _ => return Err("missing directive keyword".to_string()),
    };

    if let Some(flag) = Flag::from_token(keyword) {
        let mut strings = Vec::new();
        let mut tags = BTreeSet::new();
        let mut links = BTreeSet::new();
        for token in &rest[1..] {
            match token {
                Token::Str(s) => strings.push(s.clone()),
                Token::Word(w) if w.starts_with('#') => {
                    tags.insert(w[1..].to_string());
                }
                Token::Word(w) if w.starts_with('^') => {
                    links.insert(w[1..].to_string());
                }
                Token::Word(w) => return Err(format!("unexpected '{w}' in header")),
            }
        }
        let (payee, narration) = match strings.len() {
            0 => (None, String::new()),
            1 => (None, strings.remove(0)),
            2 => {
                let narration = strings.remove(1);
                (Some(strings.remove(0)), narration)
            }
            n => return Err(format!("too many strings ({n}) in header")),
        };
        return Ok(Parsed::Transaction(PendingTransaction {
            tx: Transaction {
                meta,
                date,
                flag,
                payee,
                narration,
                tags,
                links,
                postings: Vec::new(),
            },
            priced: false,
        }));
    }

    match keyword {
        "balance" => {
            let account = match rest.get(1) {
                Some(Token::Word(a)) => a.clone(),
                _ => return Err("balance needs an account".to_string()),
            };
            let amount = parse_amount(rest.get(2), rest.get(3))
                .ok_or_else(|| "balance needs an amount".to_string())?;
            Ok(Parsed::Entry(Directive::Balance(Balance {
                meta,
                date,
                account,
                amount,
            })))
        }
        "open" => {
            let account = match rest.get(1) {
                Some(Token::Word(a)) => a.clone(),
                _ => return Err("open needs an account".to_string()),
            };
            let currencies = match rest.get(2) {
                Some(Token::Word(c)) => c
                    .split(',')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            Ok(Parsed::Entry(Directive::Open(Open {
                meta,
                date,
                account,
                currencies,
            })))
        }
        other => {
            tracing::trace!(line = index + 1, directive = other, "Skipping directive");
            Ok(Parsed::Skipped)
        }
    }
}

/// Parse Beancount `content`. `filename` is recorded in each entry's meta
/// and in errors. A directive that fails to parse is dropped, postings
/// included, and reported in [`ParsedFile::errors`].
pub fn parse_str(content: &str, filename: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();
    let mut current: Option<PendingTransaction> = None;

    let parse_err = |line: usize, reason: String| StorageError::Parse {
        file: filename.to_string(),
        line,
        reason,
    };

    for (index, line) in content.lines().enumerate() {
        let lineno = index + 1;
        let trimmed = line.trim();

        if line.starts_with([' ', '\t']) {
            if trimmed.is_empty() || trimmed.starts_with(';') || is_metadata(trimmed) {
                continue;
            }
            if let Some(pending) = current.as_mut() {
                match parse_posting(trimmed) {
                    Some(p) => {
                        pending.priced |= p.priced;
                        pending.tx.postings.push(p.posting);
                    }
                    None => {
                        parsed
                            .errors
                            .push(parse_err(lineno, format!("invalid posting '{trimmed}'")));
                        current = None;
                    }
                }
            }
            continue;
        }

        if let Some(pending) = current.take() {
            parsed.entries.push(pending.finish());
        }
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }

        let header = tokenize(trimmed).and_then(|tokens| parse_header(tokens, filename, index));
        match header {
            Ok(Parsed::Include(target)) => parsed.includes.push(target),
            Ok(Parsed::Entry(entry)) => parsed.entries.push(entry),
            Ok(Parsed::Transaction(pending)) => current = Some(pending),
            Ok(Parsed::Skipped) => {}
            Err(reason) => parsed.errors.push(parse_err(lineno, reason)),
        }
    }

    if let Some(pending) = current.take() {
        parsed.entries.push(pending.finish());
    }
    parsed
}

/// Split `content` into the source text of each dated directive, in file
/// order. Comments, blank lines and undated lines (`option`, `include`, ...)
/// between directives are not part of any block.
pub fn dated_blocks(content: &str) -> Vec<SourceBlock> {
    fn close(block: SourceBlock) -> SourceBlock {
        let text = format!("{}\n", block.text.trim_end());
        SourceBlock { text, ..block }
    }

    let mut blocks = Vec::new();
    let mut current: Option<SourceBlock> = None;

    for (index, line) in content.lines().enumerate() {
        if line.starts_with([' ', '\t']) {
            if let Some(block) = current.as_mut() {
                block.text.push_str(line);
                block.text.push('\n');
            }
            continue;
        }

        blocks.extend(current.take().map(close));
        let trimmed = line.trim();
        match trimmed.split_whitespace().next().and_then(parse_date) {
            Some(date) => {
                current = Some(SourceBlock {
                    date,
                    line: index + 1,
                    text: format!("{line}\n"),
                });
            }
            None if trimmed.is_empty() || trimmed.starts_with(';') => {}
            None => tracing::debug!(line = index + 1, text = trimmed, "Undated line, not part of any entry"),
        }
    }
    blocks.extend(current.take().map(close));
    blocks
}
