//! Output format writers.
//!
//! This module provides writers for different output formats:
//! - [`write_txt`] / [`to_txt`] - plain-text transcript with day separators
//! - [`write_json`] / [`to_json`] - one document holding run metadata and messages
//! - [`write_jsonl`] / [`to_jsonl`] - JSON Lines (one message per line)
//! - [`write_csv`] / [`to_csv`] - CSV with semicolon delimiter - requires `csv-output` feature
//!
//! Every writer takes the messages, the [`RunMetadata`] of the fetch that
//! produced them and an [`OutputConfig`].
//!
//! # Example
//!
//! ```rust
//! use chatsweep::core::output::{to_jsonl, to_txt};
//! use chatsweep::core::{ChannelKind, FetchSpec, OutputConfig, RunMetadata, SourceDescriptor};
//! use chatsweep::{Author, Message, Snowflake};
//! use chrono::Utc;
//!
//! # fn main() -> chatsweep::Result<()> {
//! let messages = vec![Message::new(Snowflake(1), Author::new("Alice"), "Hello!", Utc::now())];
//! let source = SourceDescriptor::new(Snowflake(9), "general", ChannelKind::Text);
//! let metadata = RunMetadata::new(source, &FetchSpec::new(), messages.len());
//!
//! let jsonl = to_jsonl(&messages, &metadata, &OutputConfig::new())?;
//! assert_eq!(jsonl.lines().count(), 1);
//!
//! let txt = to_txt(&messages, &metadata, &OutputConfig::new())?;
//! assert!(txt.contains("Alice"));
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "csv-output")]
mod csv_writer;
mod json_writer;
mod jsonl_writer;
mod txt_writer;

use serde::Serialize;

#[cfg(feature = "csv-output")]
pub use csv_writer::{to_csv, write_csv};
pub use json_writer::{to_json, write_json};
pub use jsonl_writer::{to_jsonl, write_jsonl};
pub use txt_writer::{to_txt, write_txt};

use crate::core::models::{OutputConfig, RunMetadata};
use crate::message::Message;
use crate::snowflake::Snowflake;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Flat message shape shared by the JSON writers.
/// Optional fields appear only when enabled in `OutputConfig`.
#[derive(Serialize)]
pub(crate) struct ExportRecord<'a> {
    author: String,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    edited: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reactions: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pinned: bool,
}

impl<'a> ExportRecord<'a> {
    pub(crate) fn from_message(msg: &'a Message, config: &OutputConfig) -> Self {
        Self {
            author: msg.author().display(),
            content: msg.content(),
            timestamp: config
                .include_timestamps
                .then(|| msg.created_at().format(TIMESTAMP_FORMAT).to_string()),
            id: config.include_ids.then(|| msg.id()),
            reply_to: if config.include_replies {
                msg.reply_to()
            } else {
                None
            },
            edited: if config.include_edited {
                msg.edited_at()
                    .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            } else {
                None
            },
            attachments: msg.attachments().iter().map(|a| a.url.as_str()).collect(),
            reactions: msg
                .reactions()
                .iter()
                .map(|r| format!("{} x{}", r.emoji, r.count))
                .collect(),
            pinned: msg.is_pinned(),
        }
    }
}

/// Document written by [`to_json`].
#[derive(Serialize)]
pub(crate) struct ExportDocument<'a> {
    metadata: &'a RunMetadata,
    messages: Vec<ExportRecord<'a>>,
}
