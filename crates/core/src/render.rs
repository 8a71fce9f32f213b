//! Beancount text rendering for the directives this workspace produces.

use std::fmt::{self, Write};

use crate::transaction::{Balance, Directive, Open, Transaction};

/// Quote a string for a Beancount header, escaping `\` and `"`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn write_transaction(f: &mut impl Write, tx: &Transaction) -> fmt::Result {
    write!(f, "{} {}", tx.date, tx.flag)?;
    if let Some(payee) = &tx.payee {
        write!(f, " {}", quote(payee))?;
    }
    write!(f, " {}", quote(&tx.narration))?;
    for tag in &tx.tags {
        write!(f, " #{tag}")?;
    }
    for link in &tx.links {
        write!(f, " ^{link}")?;
    }
    writeln!(f)?;

    // Align accounts on the left and numbers on the right.
    let account_width = tx.postings.iter().map(|p| p.account.len()).max().unwrap_or(0);
    let number_width = tx
        .postings
        .iter()
        .filter_map(|p| p.units.as_ref())
        .map(|u| u.number.to_string().len())
        .max()
        .unwrap_or(0);

    for posting in &tx.postings {
        match &posting.units {
            Some(units) => writeln!(
                f,
                "  {:<aw$}  {:>nw$} {}",
                posting.account,
                units.number.to_string(),
                units.currency,
                aw = account_width,
                nw = number_width,
            )?,
            None => writeln!(f, "  {}", posting.account)?,
        }
    }
    Ok(())
}

fn write_balance(f: &mut impl Write, b: &Balance) -> fmt::Result {
    writeln!(f, "{} balance {}  {}", b.date, b.account, b.amount)
}

fn write_open(f: &mut impl Write, o: &Open) -> fmt::Result {
    write!(f, "{} open {}", o.date, o.account)?;
    if !o.currencies.is_empty() {
        write!(f, "  {}", o.currencies.join(","))?;
    }
    writeln!(f)
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Open(o) => write_open(f, o),
            Directive::Balance(b) => write_balance(f, b),
            Directive::Transaction(t) => write_transaction(f, t),
        }
    }
}

/// Render entries in order, separated by blank lines.
pub fn render_entries(entries: &[Directive]) -> String {
    let mut out = String::new();
    for entry in entries {
        // Writing into a String cannot fail.
        let _ = write!(out, "{entry}");
        out.push('\n');
    }
    out
}
