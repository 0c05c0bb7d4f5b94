//! CLI tests: argument parsing and the binary's offline behavior.
//!
//! Nothing here reaches the network; every run either stops at argument
//! parsing or at credential resolution.

#![cfg(feature = "cli")]

use std::str::FromStr;

use assert_cmd::Command;
use clap::Parser;
use predicates::prelude::*;
use tempfile::tempdir;

use chatsweep::cli::{Cli, Command as Sub};
use chatsweep::format::OutputFormat;
use chatsweep::Snowflake;

fn chatsweep() -> Command {
    let mut cmd = Command::cargo_bin("chatsweep").unwrap();
    cmd.env_remove("DISCORD_USER_TOKEN")
        .env_remove("DISCORD_BOT_TOKEN")
        .env_remove("DEFAULT_FORMAT")
        .env_remove("SEARCH_LIMIT")
        .env_remove("SWEEP_CONCURRENCY");
    cmd
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_output_format_from_str_all_variants() {
    assert_eq!(OutputFormat::from_str("txt"), Ok(OutputFormat::Txt));
    assert_eq!(OutputFormat::from_str("text"), Ok(OutputFormat::Txt));
    assert_eq!(OutputFormat::from_str("JSON"), Ok(OutputFormat::Json));
    assert_eq!(OutputFormat::from_str("ndjson"), Ok(OutputFormat::Jsonl));
    assert_eq!(OutputFormat::from_str("Csv"), Ok(OutputFormat::Csv));
}

#[test]
fn test_output_format_from_str_errors() {
    assert!(OutputFormat::from_str("").is_err());
    assert!(OutputFormat::from_str("xml").is_err());
    assert!(OutputFormat::from_str("pdf").is_err());
}

#[test]
fn test_export_dms_filters() {
    let cli = Cli::try_parse_from([
        "chatsweep",
        "export-dms",
        "--before",
        "2024-02-29",
        "--pinned",
        "--limit",
        "10",
    ])
    .unwrap();
    let Sub::ExportDms { filters } = cli.command else {
        panic!("expected export-dms");
    };

    let spec = filters.to_spec().unwrap();
    assert!(spec.pinned_only);
    assert_eq!(spec.limit, Some(10));
    let to = spec.date_to.unwrap();
    assert_eq!(to.format("%Y-%m-%d %H:%M:%S%.3f").to_string(), "2024-02-29 23:59:59.999");
}

#[test]
fn test_channels_requires_guild_id() {
    assert!(Cli::try_parse_from(["chatsweep", "channels"]).is_err());
    let cli = Cli::try_parse_from(["chatsweep", "channels", "81384788765712384"]).unwrap();
    assert!(matches!(
        cli.command,
        Sub::Channels { guild_id } if guild_id == Snowflake(81384788765712384)
    ));
}

#[test]
fn test_user_rule_with_window() {
    let cli = Cli::try_parse_from([
        "chatsweep",
        "search",
        "deploy",
        "--user",
        "alice@2024-01-01..2024-01-31",
    ])
    .unwrap();
    let Sub::Search { users, .. } = cli.command else {
        panic!("expected search");
    };
    assert_eq!(users[0].name_pattern, "alice");
    assert!(users[0].date_from.is_some());
    assert!(users[0].date_to.is_some());
}

// ============================================================================
// Binary
// ============================================================================

#[test]
fn test_help_lists_commands() {
    chatsweep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export-dms"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("DISCORD_USER_TOKEN"));
}

#[test]
fn test_version() {
    chatsweep()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_format_is_usage_error() {
    chatsweep()
        .args(["whoami", "--format", "xml"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_missing_token_fails_before_network() {
    let dir = tempdir().unwrap();
    chatsweep()
        .current_dir(dir.path())
        .arg("whoami")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("DISCORD_USER_TOKEN"));
}

#[test]
fn test_placeholder_token_is_ignored() {
    let dir = tempdir().unwrap();
    chatsweep()
        .current_dir(dir.path())
        .env("DISCORD_USER_TOKEN", "YOUR_USER_TOKEN_HERE")
        .arg("servers")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_bad_config_number_is_reported() {
    let dir = tempdir().unwrap();
    chatsweep()
        .current_dir(dir.path())
        .env("DISCORD_BOT_TOKEN", "abc")
        .env("SEARCH_LIMIT", "lots")
        .arg("whoami")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("SEARCH_LIMIT"));
}
