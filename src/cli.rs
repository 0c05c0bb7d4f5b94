//! Command-line interface definition using clap.
//!
//! This module defines:
//! - [`Cli`] - top-level arguments and global options
//! - [`Command`] - one subcommand per workflow
//! - [`FilterArgs`] - filter flags shared by the export commands
//!
//! Parsing is separate from execution, so the argument surface can be
//! tested without a network:
//!
//! ```rust
//! use chatsweep::cli::{Cli, Command};
//! use clap::Parser;
//!
//! let cli = Cli::try_parse_from(["chatsweep", "export", "123", "--limit", "50"]).unwrap();
//! let Command::Export { filters, .. } = cli.command else { panic!() };
//! assert_eq!(filters.to_spec().unwrap().limit, Some(50));
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::filter::{FetchSpec, UserFilterRule};
use crate::core::models::OutputConfig;
use crate::error::Result;
use crate::format::OutputFormat;
use crate::snowflake::Snowflake;

/// Fetch, filter and archive Discord message history.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatsweep")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    chatsweep whoami
    chatsweep channels 81384788765712384
    chatsweep export 81384788862181376 --after 2024-01-01 --format jsonl
    chatsweep export 81384788862181376 --user alice --user 'bob@2024-06-01..'
    chatsweep export-dms --no-bots --limit 500
    chatsweep search deploy --before 2024-03-31 --per-channel-limit 50

Tokens are read from DISCORD_USER_TOKEN or DISCORD_BOT_TOKEN (.env is loaded).")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format: txt, json, jsonl, csv [default: DEFAULT_FORMAT or txt]
    #[arg(short, long, global = true, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Directory for exported files [default: EXPORT_DIR or ./exports]
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Sources fetched at the same time [default: SWEEP_CONCURRENCY or 1]
    #[arg(long, global = true, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Include timestamps in JSON/JSONL/CSV output
    #[arg(short = 't', long, global = true)]
    pub timestamps: bool,

    /// Include message IDs in output
    #[arg(long, global = true)]
    pub ids: bool,

    /// Include reply references in JSON/JSONL/CSV output
    #[arg(short = 'r', long, global = true)]
    pub replies: bool,

    /// Include edit timestamps in JSON/JSONL/CSV output
    #[arg(short = 'e', long, global = true)]
    pub edited: bool,
}

impl Cli {
    /// Output configuration from the `--timestamps`/`--ids`/... flags.
    pub fn output_config(&self) -> OutputConfig {
        let mut config = OutputConfig::new();
        if self.timestamps {
            config = config.with_timestamps();
        }
        if self.ids {
            config = config.with_ids();
        }
        if self.replies {
            config = config.with_replies();
        }
        if self.edited {
            config = config.with_edited();
        }
        config
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the account the token belongs to
    Whoami,

    /// List the servers the account is in
    Servers,

    /// List DM and group DM conversations
    Dms,

    /// List a server's text channels
    Channels {
        /// Server ID
        guild_id: Snowflake,
    },

    /// Export one channel or DM
    Export {
        /// Channel ID
        channel_id: Snowflake,

        /// Server the channel belongs to (used to name the export)
        #[arg(long, value_name = "ID")]
        guild: Option<Snowflake>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Export every DM conversation, one file each
    ExportDms {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Search every text channel of every server for a keyword
    Search {
        /// Text to look for (case-insensitive)
        keyword: String,

        /// Only messages on or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_name = "DATE")]
        after: Option<String>,

        /// Only messages on or before this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_name = "DATE")]
        before: Option<String>,

        /// Only messages from matching authors
        #[arg(long = "user", value_name = "PATTERN[@FROM..TO]")]
        users: Vec<UserFilterRule>,

        /// Matches kept per channel [default: SEARCH_LIMIT or 200]
        #[arg(long, value_name = "N")]
        per_channel_limit: Option<usize>,
    },
}

/// Filter flags shared by `export` and `export-dms`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only messages on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub after: Option<String>,

    /// Only messages on or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub before: Option<String>,

    /// Only messages from matching authors; repeat for several users
    #[arg(long = "user", value_name = "PATTERN[@FROM..TO]")]
    pub users: Vec<UserFilterRule>,

    /// Only messages containing this text (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub keyword: Option<String>,

    /// Skip messages from bot accounts
    #[arg(long)]
    pub no_bots: bool,

    /// Only pinned messages
    #[arg(long)]
    pub pinned: bool,

    /// Stop after this many matching messages
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

impl FilterArgs {
    /// Builds the fetch spec, validating the dates.
    pub fn to_spec(&self) -> Result<FetchSpec> {
        let mut spec = build_spec(self.after.as_deref(), self.before.as_deref(), &self.users)?
            .with_include_bots(!self.no_bots)
            .with_pinned_only(self.pinned);
        if let Some(keyword) = &self.keyword {
            spec = spec.with_keyword(keyword.clone());
        }
        if let Some(limit) = self.limit {
            spec = spec.with_limit(limit);
        }
        Ok(spec)
    }
}

/// Date window plus user rules, the part every command shares.
pub fn build_spec(
    after: Option<&str>,
    before: Option<&str>,
    users: &[UserFilterRule],
) -> Result<FetchSpec> {
    let mut spec = FetchSpec::new().with_user_rules(users.iter().cloned());
    if let Some(after) = after {
        spec = spec.with_date_from(after)?;
    }
    if let Some(before) = before {
        spec = spec.with_date_to(before)?;
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("chatsweep").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_export_filters() {
        let cli = parse(&[
            "export",
            "42",
            "--guild",
            "7",
            "--after",
            "2024-01-01",
            "--user",
            "alice",
            "--user",
            "bob@2024-06-01..",
            "--no-bots",
            "--keyword",
            "Deploy",
        ]);
        let Command::Export {
            channel_id,
            guild,
            filters,
        } = cli.command
        else {
            panic!("expected export");
        };
        assert_eq!(channel_id, Snowflake(42));
        assert_eq!(guild, Some(Snowflake(7)));

        let spec = filters.to_spec().unwrap();
        assert!(spec.date_from.is_some());
        assert_eq!(spec.user_rules.len(), 2);
        assert!(spec.user_rules[1].date_from.is_some());
        assert!(!spec.include_bots);
        assert_eq!(spec.keyword.as_deref(), Some("Deploy"));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse(&["export-dms", "--format", "jsonl", "-o", "out", "--concurrency", "3", "--ids"]);
        assert_eq!(cli.format, Some(OutputFormat::Jsonl));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.concurrency, Some(3));
        assert!(cli.output_config().include_ids);
        assert!(!cli.output_config().include_timestamps);
    }

    #[test]
    fn test_search_arguments() {
        let cli = parse(&["search", "deploy", "--user", "carol", "--per-channel-limit", "25"]);
        let Command::Search {
            keyword,
            users,
            per_channel_limit,
            ..
        } = cli.command
        else {
            panic!("expected search");
        };
        assert_eq!(keyword, "deploy");
        assert_eq!(users[0].name_pattern, "carol");
        assert_eq!(per_channel_limit, Some(25));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["chatsweep", "export", "not-an-id"]).is_err());
        assert!(Cli::try_parse_from(["chatsweep", "dms", "--format", "pdf"]).is_err());
        assert!(Cli::try_parse_from(["chatsweep", "export", "1", "--user", "@2024-01-01.."]).is_err());
    }

    #[test]
    fn test_bad_date_surfaces_from_to_spec() {
        let cli = parse(&["export", "1", "--after", "yesterday"]);
        let Command::Export { filters, .. } = cli.command else {
            panic!("expected export");
        };
        assert!(filters.to_spec().unwrap_err().is_invalid_date());
    }
}
