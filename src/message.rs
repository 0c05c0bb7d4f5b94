//! Canonical message type shared by every transport.
//!
//! This module provides [`Message`], the normalized representation of a
//! platform message. Wire records are converted into it once, by
//! [`normalize`](crate::parsing::discord::normalize), and it is never modified
//! afterwards. The one exception is [`Message::into_pinned`], used by the
//! pinned-set path.
//!
//! # Overview
//!
//! A message consists of:
//! - **Required**: `id`, `author`, `content` (may be empty), `created_at`
//! - **Optional**: `edited_at`, `reply_to`
//! - **Collections**: `attachments`, `embeds`, `reactions` (empty when absent)
//!
//! # Examples
//!
//! ```
//! use chatsweep::{Author, Message, Snowflake};
//! use chrono::{TimeZone, Utc};
//!
//! let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
//! let msg = Message::new(Snowflake(1), Author::new("Alice"), "Hello!", at)
//!     .with_reply_to(Snowflake(0));
//!
//! assert_eq!(msg.author().display_name(), "Alice");
//! assert_eq!(msg.content(), "Hello!");
//! assert!(msg.is_reply());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snowflake::Snowflake;

/// Identity of a message author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    display_name: String,
    username: String,
    id: Snowflake,
    discriminator: String,
    bot: bool,
}

impl Author {
    /// Creates an author whose display name and username are both `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            username: name,
            id: Snowflake::default(),
            discriminator: "0".to_string(),
            bot: false,
        }
    }

    /// Sets the raw account username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the author id.
    #[must_use]
    pub fn with_id(mut self, id: Snowflake) -> Self {
        self.id = id;
        self
    }

    /// Sets the legacy discriminator (`"0"` means none).
    #[must_use]
    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = discriminator.into();
        self
    }

    /// Marks the author as a bot account.
    #[must_use]
    pub fn with_bot(mut self, bot: bool) -> Self {
        self.bot = bot;
        self
    }

    /// Returns the display name (global name, falling back to the username).
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the raw account username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the author id.
    pub fn id(&self) -> Snowflake {
        self.id
    }

    /// Returns the legacy discriminator.
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// Returns `true` for bot accounts.
    pub fn is_bot(&self) -> bool {
        self.bot
    }

    /// Returns `name#discriminator`, or just the name for migrated accounts.
    pub fn tag(&self) -> String {
        if self.discriminator.is_empty() || self.discriminator == "0" {
            self.display_name.clone()
        } else {
            format!("{}#{}", self.display_name, self.discriminator)
        }
    }

    /// Returns the tag with a ` [BOT]` suffix for bot accounts.
    pub fn display(&self) -> String {
        let mut tag = self.tag();
        if self.bot {
            tag.push_str(" [BOT]");
        }
        tag
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    /// Size in bytes.
    pub size: u64,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, url: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            size,
        }
    }

    /// Size in kibibytes.
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

/// Simplified rich embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

/// One name/value row of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A reaction and how many users added it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Unicode emoji, or `:name:` for custom emoji.
    pub emoji: String,
    pub count: u32,
}

impl Reaction {
    pub fn new(emoji: impl Into<String>, count: u32) -> Self {
        Self {
            emoji: emoji.into(),
            count,
        }
    }
}

/// A normalized message from a channel history.
///
/// Fields are private: a message is assembled with [`Message::new`] and the
/// consuming `with_*` builders, then only read through accessors.
///
/// # Serialization
///
/// Implements `Serialize` and `Deserialize`:
/// - Optional fields are omitted from JSON when `None`
/// - Empty collections are omitted
/// - Timestamps use RFC 3339 format
///
/// ```
/// use chatsweep::{Author, Message, Snowflake};
/// use chrono::Utc;
///
/// let msg = Message::new(Snowflake(123), Author::new("Alice"), "Hello!", Utc::now());
/// let json = serde_json::to_string(&msg)?;
///
/// assert!(!json.contains("edited_at"));
/// assert!(json.contains("123"));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: Snowflake,
    author: Author,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    edited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    reactions: Vec<Reaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    reply_to: Option<Snowflake>,
    #[serde(default)]
    pinned: bool,
}

impl Message {
    /// Creates a message with the required fields; everything else is empty.
    pub fn new(
        id: Snowflake,
        author: Author,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author,
            content: content.into(),
            created_at,
            edited_at: None,
            attachments: Vec::new(),
            embeds: Vec::new(),
            reactions: Vec::new(),
            reply_to: None,
            pinned: false,
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Builder method to set the edited timestamp.
    #[must_use]
    pub fn with_edited_at(mut self, ts: DateTime<Utc>) -> Self {
        self.edited_at = Some(ts);
        self
    }

    /// Builder method to set attachments.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Builder method to set embeds.
    #[must_use]
    pub fn with_embeds(mut self, embeds: Vec<Embed>) -> Self {
        self.embeds = embeds;
        self
    }

    /// Builder method to set reactions.
    #[must_use]
    pub fn with_reactions(mut self, reactions: Vec<Reaction>) -> Self {
        self.reactions = reactions;
        self
    }

    /// Builder method to set the reply reference.
    #[must_use]
    pub fn with_reply_to(mut self, id: Snowflake) -> Self {
        self.reply_to = Some(id);
        self
    }

    /// Builder method to set the pinned flag as reported by the wire record.
    #[must_use]
    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Returns the message marked as pinned.
    ///
    /// Used when the message was sourced from the pinned set.
    #[must_use]
    pub fn into_pinned(self) -> Self {
        self.with_pinned(true)
    }

    // =========================================================================
    // Accessor methods
    // =========================================================================

    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn edited_at(&self) -> Option<DateTime<Utc>> {
        self.edited_at
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn embeds(&self) -> &[Embed] {
        &self.embeds
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn reply_to(&self) -> Option<Snowflake> {
        self.reply_to
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    // =========================================================================
    // Utility methods
    // =========================================================================

    /// Returns `true` if this message replies to another one.
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Returns `true` if the text content is empty or whitespace-only.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Sort key used for result ordering: time first, then id.
    pub fn sort_key(&self) -> (DateTime<Utc>, Snowflake) {
        (self.created_at, self.id)
    }
}
