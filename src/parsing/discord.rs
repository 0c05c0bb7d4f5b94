//! Discord REST wire records.
//!
//! [`normalize`] turns one entry of a `GET /channels/{id}/messages` (or
//! `/pins`) response into a [`Message`]. The discovery endpoints deserialize
//! into [`RawChannel`], [`RawGuild`] and [`RawUser`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::{ChatsweepError, Result};
use crate::message::{Attachment, Author, Embed, EmbedField, Message, Reaction};
use crate::snowflake::Snowflake;

/// Ids arrive as strings from the live API and as numbers from some replays.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireId {
    Str(String),
    Num(u64),
}

impl WireId {
    fn to_snowflake(&self) -> Option<Snowflake> {
        match self {
            WireId::Str(s) => s.parse().ok(),
            WireId::Num(n) => Some(Snowflake(*n)),
        }
    }
}

fn de_snowflake<'de, D>(deserializer: D) -> std::result::Result<Snowflake, D::Error>
where
    D: Deserializer<'de>,
{
    let id = WireId::deserialize(deserializer)?;
    id.to_snowflake()
        .ok_or_else(|| D::Error::custom(format!("invalid snowflake: {id:?}")))
}

fn de_opt_snowflake<'de, D>(deserializer: D) -> std::result::Result<Option<Snowflake>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<WireId>::deserialize(deserializer)?
        .map(|id| {
            id.to_snowflake()
                .ok_or_else(|| D::Error::custom(format!("invalid snowflake: {id:?}")))
        })
        .transpose()
}

/// Optional field: a value of the wrong shape reads as absent.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Optional list: entries of the wrong shape are dropped one by one.
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// ============================================================================
// Message records
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: WireId,
    author: RawAuthor,
    #[serde(default, deserialize_with = "lenient")]
    content: Option<String>,
    timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    edited_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    attachments: Vec<RawAttachment>,
    #[serde(default, deserialize_with = "lenient_list")]
    embeds: Vec<RawEmbed>,
    #[serde(default, deserialize_with = "lenient_list")]
    reactions: Vec<RawReaction>,
    #[serde(default, deserialize_with = "lenient")]
    message_reference: Option<RawReference>,
    #[serde(default, deserialize_with = "lenient")]
    pinned: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    id: Option<WireId>,
    #[serde(default, deserialize_with = "lenient")]
    username: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    global_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    discriminator: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    bot: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    #[serde(default, deserialize_with = "lenient")]
    filename: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawEmbed {
    #[serde(default, deserialize_with = "lenient")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    color: Option<u32>,
    #[serde(default, deserialize_with = "lenient_list")]
    fields: Vec<RawEmbedField>,
}

#[derive(Debug, Deserialize)]
struct RawEmbedField {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    value: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    inline: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawReaction {
    #[serde(default, deserialize_with = "lenient")]
    emoji: Option<RawEmoji>,
    #[serde(default, deserialize_with = "lenient")]
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawEmoji {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<WireId>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReference {
    #[serde(default, deserialize_with = "lenient")]
    message_id: Option<WireId>,
}

/// Normalizes one raw message record.
///
/// Any record carrying an `id` and an `author` object is accepted; every other
/// field falls back to an empty value when absent or of the wrong shape. When
/// `timestamp` is missing the creation time is decoded from the id. An
/// unreadable `edited_timestamp` is logged and dropped.
///
/// # Errors
///
/// Returns [`ChatsweepError::MalformedRecord`] when the id or author is missing
/// or unparsable, or when `timestamp` is present but unreadable.
///
/// # Example
///
/// ```
/// use chatsweep::parsing::discord::normalize;
/// use serde_json::json;
///
/// let raw = json!({
///     "id": "1195012345678901248",
///     "author": { "id": "1", "username": "alice", "global_name": "Alice" },
///     "content": "hi",
///     "timestamp": "2024-01-12T10:00:00.000000+00:00"
/// });
/// let msg = normalize(&raw)?;
/// assert_eq!(msg.author().display_name(), "Alice");
/// # Ok::<(), chatsweep::ChatsweepError>(())
/// ```
pub fn normalize(raw: &Value) -> Result<Message> {
    if raw.get("id").is_none_or(Value::is_null) {
        return Err(ChatsweepError::malformed("record has no id"));
    }
    if raw.get("author").is_none_or(Value::is_null) {
        return Err(ChatsweepError::malformed("record has no author"));
    }

    let record = RawMessage::deserialize(raw)
        .map_err(|e| ChatsweepError::malformed(format!("unexpected record shape: {e}")))?;

    let id = record
        .id
        .to_snowflake()
        .ok_or_else(|| ChatsweepError::malformed(format!("invalid message id {:?}", record.id)))?;

    let author = normalize_author(record.author)?;

    let created_at = match record.timestamp.as_deref().map(str::trim) {
        Some(ts) if !ts.is_empty() => parse_timestamp(ts)?,
        _ => id.timestamp(),
    };

    let mut msg = Message::new(id, author, record.content.unwrap_or_default(), created_at)
        .with_pinned(record.pinned.unwrap_or(false));

    if let Some(edited) = record.edited_timestamp.as_deref().map(str::trim) {
        match parse_timestamp(edited) {
            Ok(edited_at) => msg = msg.with_edited_at(edited_at),
            Err(_) if edited.is_empty() => {}
            Err(err) => warn!(id = %id, error = %err, "Ignoring unreadable edit timestamp"),
        }
    }

    if let Some(reply_to) = record
        .message_reference
        .and_then(|r| r.message_id)
        .and_then(|id| id.to_snowflake())
    {
        msg = msg.with_reply_to(reply_to);
    }

    let attachments = record
        .attachments
        .into_iter()
        .map(|a| {
            Attachment::new(
                a.filename.unwrap_or_else(|| "unknown".to_string()),
                a.url.unwrap_or_default(),
                a.size.unwrap_or(0),
            )
        })
        .collect();

    let embeds = record
        .embeds
        .into_iter()
        .map(|e| Embed {
            title: e.title,
            description: e.description,
            url: e.url,
            color: e.color,
            fields: e
                .fields
                .into_iter()
                .map(|f| EmbedField {
                    name: f.name.unwrap_or_default(),
                    value: f.value.unwrap_or_default(),
                    inline: f.inline.unwrap_or(false),
                })
                .collect(),
        })
        .collect();

    let reactions = record
        .reactions
        .into_iter()
        .map(|r| Reaction::new(emoji_label(r.emoji.as_ref()), r.count.unwrap_or(0)))
        .collect();

    Ok(msg
        .with_attachments(attachments)
        .with_embeds(embeds)
        .with_reactions(reactions))
}

/// Reads a record's id without normalizing the rest of it.
pub fn record_id(raw: &Value) -> Option<Snowflake> {
    match raw.get("id")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(Snowflake),
        _ => None,
    }
}

fn normalize_author(raw: RawAuthor) -> Result<Author> {
    let username = raw.username.unwrap_or_else(|| "Unknown".to_string());
    let display_name = raw
        .global_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| username.clone());

    let id = match raw.id {
        Some(id) => id
            .to_snowflake()
            .ok_or_else(|| ChatsweepError::malformed(format!("invalid author id {id:?}")))?,
        None => Snowflake::default(),
    };

    Ok(Author::new(display_name)
        .with_username(username)
        .with_id(id)
        .with_discriminator(raw.discriminator.unwrap_or_else(|| "0".to_string()))
        .with_bot(raw.bot.unwrap_or(false)))
}

/// Custom emoji render as `:name:`, unicode emoji as themselves.
fn emoji_label(emoji: Option<&RawEmoji>) -> String {
    let Some(emoji) = emoji else {
        return "?".to_string();
    };
    if emoji.id.is_some() {
        format!(":{}:", emoji.name.as_deref().unwrap_or("emoji"))
    } else {
        emoji.name.clone().unwrap_or_else(|| "?".to_string())
    }
}

/// Parses an API timestamp into UTC.
///
/// Accepts RFC 3339 (`Z` or `+00:00`, with or without fractional seconds),
/// offsets without a colon (`+0000`), and naive timestamps, which are taken
/// to be UTC.
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.to_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.to_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(ChatsweepError::malformed(format!("unreadable timestamp '{ts}'")))
}

// ============================================================================
// Discovery records
// ============================================================================

/// A user object from `/users/@me` or a DM recipient list.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: Snowflake,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl RawUser {
    /// Global name, falling back to the username.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
            .unwrap_or("Unknown")
    }

    /// Display name with the legacy `#discriminator` suffix when one is set.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.display_name()),
            _ => self.display_name().to_string(),
        }
    }
}

/// A channel object from `/users/@me/channels` or `/guilds/{id}/channels`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChannel {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: Snowflake,
    /// Numeric channel type code.
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_snowflake")]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub recipients: Vec<RawUser>,
}

/// A guild object from `/users/@me/guilds`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGuild {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
}
