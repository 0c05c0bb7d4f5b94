//! Run metadata and output configuration.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::filter::{FetchSpec, UserFilterRule};
use crate::parsing::discord::{RawChannel, RawGuild};
use crate::snowflake::Snowflake;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// What kind of conversation a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Thread,
    Forum,
    Stage,
    Category,
    #[serde(rename = "dm")]
    DirectMessage,
    #[serde(rename = "group_dm")]
    GroupDirectMessage,
    /// Synthetic result set merged from many sources.
    Search,
}

impl ChannelKind {
    /// Classifies a numeric channel type code. Unknown codes are treated as text.
    pub fn from_type_code(code: u8) -> Self {
        match code {
            1 => ChannelKind::DirectMessage,
            2 => ChannelKind::Voice,
            3 => ChannelKind::GroupDirectMessage,
            4 => ChannelKind::Category,
            10..=12 => ChannelKind::Thread,
            13 => ChannelKind::Stage,
            15 | 16 => ChannelKind::Forum,
            _ => ChannelKind::Text,
        }
    }

    /// Returns `true` for one-to-one and group DMs.
    pub fn is_direct(self) -> bool {
        matches!(
            self,
            ChannelKind::DirectMessage | ChannelKind::GroupDirectMessage
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Text => "text",
            ChannelKind::Voice => "voice",
            ChannelKind::Thread => "thread",
            ChannelKind::Forum => "forum",
            ChannelKind::Stage => "stage",
            ChannelKind::Category => "category",
            ChannelKind::DirectMessage => "dm",
            ChannelKind::GroupDirectMessage => "group_dm",
            ChannelKind::Search => "search",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a result set came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub channel_id: Snowflake,
    pub channel_name: String,
    pub kind: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub guild_name: Option<String>,
}

impl SourceDescriptor {
    pub fn new(channel_id: Snowflake, channel_name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            channel_id,
            channel_name: channel_name.into(),
            kind,
            guild_id: None,
            guild_name: None,
        }
    }

    #[must_use]
    pub fn with_guild(mut self, guild_id: Snowflake, guild_name: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id);
        self.guild_name = Some(guild_name.into());
        self
    }

    /// Builds a descriptor from discovery records.
    ///
    /// DMs are named after their first recipient. Group DMs use their own
    /// name, falling back to the first three recipients.
    pub fn from_channel(channel: &RawChannel, guild: Option<&RawGuild>) -> Self {
        let kind = ChannelKind::from_type_code(channel.kind);

        let channel_name = match kind {
            ChannelKind::DirectMessage => channel
                .recipients
                .first()
                .map_or_else(|| "Unknown DM".to_string(), |r| r.display_name().to_string()),
            ChannelKind::GroupDirectMessage => match channel.name.as_deref() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ if !channel.recipients.is_empty() => channel
                    .recipients
                    .iter()
                    .take(3)
                    .map(|r| r.username.as_deref().unwrap_or("?"))
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => "Unnamed Group DM".to_string(),
            },
            _ => channel
                .name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        };

        Self {
            channel_id: channel.id,
            channel_name,
            kind,
            guild_id: guild.map(|g| g.id).or(channel.guild_id),
            guild_name: guild.and_then(|g| g.name.clone()),
        }
    }

    /// Descriptor for a merged keyword search.
    pub fn search(keyword: &str) -> Self {
        Self::new(Snowflake::default(), format!("search_{keyword}"), ChannelKind::Search)
    }

    /// Friendly label for where these messages came from.
    pub fn label(&self) -> String {
        if let Some(guild) = &self.guild_name {
            return format!("{guild} › #{}", self.channel_name);
        }
        match self.kind {
            ChannelKind::DirectMessage => format!("DM with {}", self.channel_name),
            ChannelKind::GroupDirectMessage => format!("Group DM: {}", self.channel_name),
            _ => format!("#{}", self.channel_name),
        }
    }

    /// Filesystem-safe file stem: the label plus a `_YYYYMMDD_HHMMSS` stamp.
    pub fn safe_filename(&self, at: DateTime<Utc>) -> String {
        let label = self.label().replace('›', "-").replace('#', "");
        let base = UNSAFE_FILENAME_CHARS.replace_all(&label, "_");
        format!("{}_{}", base.trim(), at.format("%Y%m%d_%H%M%S"))
    }
}

/// Facts about a finished fetch, written into every export.
///
/// Built once from the source, the [`FetchSpec`] and the result count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub source: SourceDescriptor,
    pub total_messages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub user_rules: Vec<UserFilterRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub keyword: Option<String>,
    pub produced_at: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new(source: SourceDescriptor, spec: &FetchSpec, total_messages: usize) -> Self {
        Self {
            source,
            total_messages,
            date_from: spec.date_from,
            date_to: spec.date_to,
            user_rules: spec.user_rules.clone(),
            keyword: spec.keyword.clone(),
            produced_at: Utc::now(),
        }
    }

    /// Overrides the production time. Used for reproducible file names.
    #[must_use]
    pub fn with_produced_at(mut self, at: DateTime<Utc>) -> Self {
        self.produced_at = at;
        self
    }

    /// File stem for exports of this run.
    pub fn file_stem(&self) -> String {
        self.source.safe_filename(self.produced_at)
    }
}

/// Configuration for output format.
/// Controls which metadata fields are included in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Include timestamps in output
    pub include_timestamps: bool,
    /// Include message IDs in output
    pub include_ids: bool,
    /// Include reply references in output
    pub include_replies: bool,
    /// Include edit timestamps in output
    pub include_edited: bool,
}

impl OutputConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every optional field enabled.
    pub fn all() -> Self {
        Self {
            include_timestamps: true,
            include_ids: true,
            include_replies: true,
            include_edited: true,
        }
    }

    #[must_use]
    pub fn with_timestamps(mut self) -> Self {
        self.include_timestamps = true;
        self
    }

    #[must_use]
    pub fn with_ids(mut self) -> Self {
        self.include_ids = true;
        self
    }

    #[must_use]
    pub fn with_replies(mut self) -> Self {
        self.include_replies = true;
        self
    }

    #[must_use]
    pub fn with_edited(mut self) -> Self {
        self.include_edited = true;
        self
    }
}
