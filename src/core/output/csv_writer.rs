//! CSV output writer.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::core::models::{OutputConfig, RunMetadata};
use crate::error::{ChatsweepError, Result};
use crate::message::Message;

/// Writes messages to CSV with semicolon delimiter.
///
/// # Format
/// - Delimiter: `;`
/// - Columns: Depends on OutputConfig
///   - Basic: `Author`, `Content`, `Attachments`
///   - With IDs / timestamps: `ID`, `Timestamp` first
///   - With replies / edits: `ReplyTo`, `Edited` last
/// - Attachments: URLs separated by a space
/// - Encoding: UTF-8
///
/// Run metadata has no place in the table; it is accepted so every writer
/// shares one signature.
pub fn write_csv(
    messages: &[Message],
    _metadata: &RunMetadata,
    config: &OutputConfig,
    output_path: &Path,
) -> Result<()> {
    let file = File::create(output_path)?;
    write_records(file, messages, config)?;
    Ok(())
}

/// Converts messages to a CSV string. Metadata is ignored, as in [`write_csv`].
pub fn to_csv(messages: &[Message], _metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
    let buffer = write_records(Vec::new(), messages, config)?;
    Ok(String::from_utf8(buffer)?)
}

fn write_records<W: io::Write>(sink: W, messages: &[Message], config: &OutputConfig) -> Result<W> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(sink);

    writer.write_record(build_header(config))?;
    for msg in messages {
        writer.write_record(build_record(msg, config))?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| ChatsweepError::Io(e.into_error()))
}

/// Build CSV header based on output configuration.
fn build_header(config: &OutputConfig) -> Vec<&'static str> {
    let mut header = Vec::new();

    if config.include_ids {
        header.push("ID");
    }
    if config.include_timestamps {
        header.push("Timestamp");
    }

    header.push("Author");
    header.push("Content");
    header.push("Attachments");

    if config.include_replies {
        header.push("ReplyTo");
    }
    if config.include_edited {
        header.push("Edited");
    }

    header
}

/// Build CSV record for a single message.
fn build_record(msg: &Message, config: &OutputConfig) -> Vec<String> {
    let mut record = Vec::new();

    if config.include_ids {
        record.push(msg.id().to_string());
    }
    if config.include_timestamps {
        record.push(msg.created_at().format("%Y-%m-%d %H:%M:%S").to_string());
    }

    record.push(msg.author().display());
    record.push(msg.content().to_string());
    record.push(
        msg.attachments()
            .iter()
            .map(|a| a.url.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    );

    if config.include_replies {
        record.push(msg.reply_to().map(|id| id.to_string()).unwrap_or_default());
    }
    if config.include_edited {
        record.push(
            msg.edited_at()
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        );
    }

    record
}
