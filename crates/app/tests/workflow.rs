use beanport::cli::is_configuration_error;
use beanport::commands::{self, ArchiveOutcome};
use beanport::{Config, ImporterConfig};
use beanport_core::{Directive, Flag};
use beanport_import::FileOutcome;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DEPOSIT: &str = "01/01/2026,100.00,Test Deposit,1000.00\n";
const SHOPPING: &str = "\
03/01/2026,-45.20,Coles Supermarket 123,954.80
05/01/2026,-12.00,Netflix.com,942.80
";

/// A ledger home laid out with the default relative names.
fn workspace() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for sub in ["imports", "ledgers", "staging"] {
        fs::create_dir_all(root.join(sub)).unwrap();
    }
    fs::write(
        root.join("accounts.bean"),
        "2020-01-01 open Assets:Test AUD\n2020-01-01 open Expenses:Groceries\n2020-01-01 open Expenses:Uncategorized\n",
    )
    .unwrap();
    fs::write(
        root.join("main.bean"),
        "include \"accounts.bean\"\ninclude \"ledgers/*.bean\"\n",
    )
    .unwrap();
    fs::write(
        root.join("user_rules.toml"),
        "[[rules]]\npattern = \"Coles\"\naccount = \"Expenses:Groceries\"\n",
    )
    .unwrap();

    let config = Config {
        main_file: root.join("main.bean"),
        accounts_file: root.join("accounts.bean"),
        rules_file: root.join("user_rules.toml"),
        imports_dir: root.join("imports"),
        ledger_dir: root.join("ledgers"),
        archive_dir: root.join("archive"),
        staging_file: root.join("staging/import.bean"),
        importers: vec![ImporterConfig {
            account: "Assets:Test".to_string(),
            filename_pattern: None,
            currency: None,
        }],
        ..Config::default()
    };
    (dir, config)
}

fn staged(config: &Config) -> String {
    fs::read_to_string(&config.staging_file).unwrap()
}

fn write_import(config: &Config, name: &str, content: &str) {
    fs::write(config.imports_dir.join(name), content).unwrap();
}

#[test]
fn uncategorized_deposit_is_staged_for_review() {
    let (_dir, config) = workspace();
    write_import(&config, "test.csv", DEPOSIT);

    let report = commands::ingest(&config).unwrap();
    assert_eq!(report.transaction_count(), 1);

    let tx = report.entries.iter().find_map(Directive::as_transaction).unwrap();
    assert_eq!(tx.flag, Flag::Warning);
    assert!(tx.tags.contains("review"));
    assert_eq!(tx.postings[1].account, "Expenses:Uncategorized");

    let text = staged(&config);
    assert!(text.contains("2026-01-01 ! \"Test Deposit\" #review\n"));
    assert!(text.contains("2026-01-02 balance Assets:Test  1000.00 AUD"));
}

#[test]
fn rule_match_books_to_rule_account() {
    let (_dir, config) = workspace();
    write_import(&config, "test.csv", SHOPPING);

    let report = commands::ingest(&config).unwrap();
    let txs: Vec<_> = report.entries.iter().filter_map(Directive::as_transaction).collect();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].flag, Flag::Okay);
    assert!(txs[0].tags.is_empty());
    assert_eq!(txs[0].postings[1].account, "Expenses:Groceries");
    assert_eq!(txs[1].postings[1].account, "Expenses:Uncategorized");
}

#[test]
fn ingest_merge_ingest_is_idempotent() {
    let (_dir, config) = workspace();
    write_import(&config, "test.csv", DEPOSIT);

    commands::ingest(&config).unwrap();
    let merged = commands::merge(&config).unwrap();
    assert_eq!(merged.total(), 2);
    assert_eq!(staged(&config), "");

    let year = fs::read_to_string(config.ledger_dir.join("2026.bean")).unwrap();
    assert!(year.starts_with("; Transactions for 2026\n\n"));
    assert!(year.contains("Test Deposit"));

    let again = commands::ingest(&config).unwrap();
    assert_eq!(again.transaction_count(), 0);
    assert_eq!(again.duplicate_count(), 1);
    assert!(matches!(
        again.files[0].outcome,
        FileOutcome::Imported { duplicates: 1, .. }
    ));
    // The balance assertion is always re-emitted.
    assert!(staged(&config).contains("balance Assets:Test"));
}

#[test]
fn ledger_years_are_found_through_glob_include() {
    let (_dir, config) = workspace();
    fs::write(
        config.ledger_dir.join("2025.bean"),
        "2025-12-31 * \"NYE\"\n  Assets:Test  -20.00 AUD\n  Expenses:Groceries  20.00 AUD\n",
    )
    .unwrap();
    write_import(&config, "test.csv", DEPOSIT);
    commands::ingest(&config).unwrap();
    commands::merge(&config).unwrap();

    let existing = commands::existing_transactions(&config.main_file).unwrap();
    let narrations: Vec<_> = existing.iter().map(|tx| tx.narration.as_str()).collect();
    assert_eq!(narrations, vec!["NYE", "Test Deposit"]);
}

#[test]
fn hand_written_entry_with_elided_leg_is_a_duplicate() {
    let (_dir, config) = workspace();
    fs::write(
        config.ledger_dir.join("2026.bean"),
        "2026-01-01 * \"Test Deposit\"\n  Income:Salary  -100.00 AUD\n  Assets:Test\n",
    )
    .unwrap();
    write_import(&config, "test.csv", DEPOSIT);

    let report = commands::ingest(&config).unwrap();
    assert_eq!(report.transaction_count(), 0);
    assert_eq!(report.duplicate_count(), 1);
}

#[test]
fn broken_ledger_entries_do_not_stop_ingest() {
    let (_dir, config) = workspace();
    fs::write(
        config.ledger_dir.join("2026.bean"),
        "\
2026-01-01 * \"Test Deposit\"
  Assets:Test  100.00 AUD
  Income:Salary
2026-01-05 * \"Unclosed
  Assets:Test  -1.00 AUD
",
    )
    .unwrap();
    write_import(&config, "test.csv", DEPOSIT);

    let report = commands::ingest(&config).unwrap();
    assert_eq!(report.transaction_count(), 0);
    assert_eq!(report.duplicate_count(), 1);

    let verify = commands::verify(&config);
    let syntax = verify.checks.iter().find(|c| c.name == "Ledger Syntax").unwrap();
    assert!(!syntax.ok);
}

#[test]
fn bad_and_unknown_files_do_not_stop_the_run() {
    let (_dir, config) = workspace();
    write_import(&config, "a_good.csv", DEPOSIT);
    write_import(&config, "b_bad.csv", "01/01/2026,abc,Broken,1.00\n");
    write_import(&config, "c_notes.txt", "hello");
    write_import(&config, ".hidden.csv", DEPOSIT);

    let report = commands::ingest(&config).unwrap();
    assert_eq!(report.files.len(), 3);
    assert_eq!(report.transaction_count(), 1);
    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.unmatched().count(), 1);
}

#[test]
fn missing_imports_dir_is_a_configuration_error() {
    let (_dir, mut config) = workspace();
    config.imports_dir = config.imports_dir.join("missing");
    let err = commands::ingest(&config).unwrap_err();
    assert!(is_configuration_error(&err));
    assert!(!config.staging_file.exists());
}

#[test]
fn missing_main_ledger_ingests_everything() {
    let (_dir, mut config) = workspace();
    config.main_file = config.main_file.with_file_name("nope.bean");
    write_import(&config, "test.csv", DEPOSIT);
    assert_eq!(commands::ingest(&config).unwrap().transaction_count(), 1);
}

#[test]
fn archive_moves_by_earliest_date() {
    let (_dir, config) = workspace();
    write_import(&config, "test.csv", DEPOSIT);
    write_import(&config, "notes.txt", "hello");

    let planned = commands::archive(&config, true).unwrap();
    assert!(config.imports_dir.join("test.csv").exists());
    assert!(planned
        .iter()
        .any(|o| matches!(o, ArchiveOutcome::Planned { .. })));

    let outcomes = commands::archive(&config, false).unwrap();
    let expected = config.archive_dir.join("2026").join("2026-01-01_test.csv");
    assert!(outcomes.contains(&ArchiveOutcome::Moved {
        source: config.imports_dir.join("test.csv"),
        destination: expected.clone(),
    }));
    assert!(expected.exists());
    assert!(!config.imports_dir.join("test.csv").exists());
    assert!(config.imports_dir.join("notes.txt").exists());
}

#[test]
fn archive_collision_appends_timestamp() {
    let (_dir, config) = workspace();
    let taken = config.archive_dir.join("2026/2026-01-01_test.csv");
    fs::create_dir_all(taken.parent().unwrap()).unwrap();
    fs::write(&taken, "old").unwrap();
    write_import(&config, "test.csv", DEPOSIT);

    let outcomes = commands::archive(&config, false).unwrap();
    let ArchiveOutcome::Moved { destination, .. } = &outcomes[0] else {
        panic!("expected a move, got {outcomes:?}");
    };
    assert_ne!(destination, &taken);
    let name = destination.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("2026-01-01_") && name.ends_with("_test.csv"));
    assert_eq!(fs::read_to_string(&taken).unwrap(), "old");
}

#[test]
fn review_writes_file_without_serving() {
    let (_dir, config) = workspace();
    let path = commands::review(&config, false).unwrap();
    assert_eq!(path, config.staging_file.with_file_name("review.bean"));
    let content = fs::read_to_string(path).unwrap();
    assert!(content.contains("option \"operating_currency\" \"AUD\""));
    assert!(content.contains("accounts.bean\""));
}

#[test]
fn verify_reports_missing_paths_and_unopened_accounts() {
    let (dir, config) = workspace();
    let report = commands::verify(&config);
    let failed: Vec<_> = report.checks.iter().filter(|c| !c.ok).map(|c| c.name.as_str()).collect();
    assert_eq!(failed, vec!["Archive Dir"]);
    assert!(report.unopened_accounts.is_empty());

    fs::create_dir(dir.path().join("archive")).unwrap();
    fs::write(
        &config.rules_file,
        "[[rules]]\npattern = \"Uber\"\naccount = \"Expenses:Transport\"\n",
    )
    .unwrap();
    let report = commands::verify(&config);
    assert_eq!(report.unopened_accounts, vec!["Expenses:Transport".to_string()]);
    assert!(!report.ok());
}

#[test]
fn staging_round_trip_through_reader() {
    let (_dir, config) = workspace();
    write_import(&config, "test.csv", SHOPPING);
    let report = commands::ingest(&config).unwrap();

    let ledger = beanport_storage::load_file(Path::new(&config.staging_file)).unwrap();
    assert_eq!(ledger.entries.len(), report.entries.len());
    assert_eq!(ledger.transactions().len(), 2);
}
