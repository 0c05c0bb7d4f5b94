//! JSON Lines (JSONL) output writer.
//!
//! JSONL format is ideal for:
//! - Machine learning pipelines
//! - Streaming processing
//! - Appending many runs into one corpus

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::ExportRecord;
use crate::core::models::{OutputConfig, RunMetadata};
use crate::error::Result;
use crate::message::Message;

/// Writes messages to JSONL (JSON Lines) format.
///
/// Each line is a valid JSON object:
/// ```jsonl
/// {"author":"Alice","content":"Hello"}
/// {"author":"Bob","content":"Hi"}
/// ```
///
/// Run metadata is not part of the line format; it is accepted so every
/// writer shares one signature.
pub fn write_jsonl(
    messages: &[Message],
    _metadata: &RunMetadata,
    config: &OutputConfig,
    output_path: &Path,
) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);

    for msg in messages {
        let record = ExportRecord::from_message(msg, config);
        serde_json::to_writer(&mut writer, &record)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Converts messages to a JSONL string. Metadata is ignored, as in
/// [`write_jsonl`].
pub fn to_jsonl(messages: &[Message], _metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
    let mut output = String::new();

    for msg in messages {
        let record = ExportRecord::from_message(msg, config);
        output.push_str(&serde_json::to_string(&record)?);
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::FetchSpec;
    use crate::core::models::{ChannelKind, SourceDescriptor};
    use crate::message::{Author, Reaction};
    use crate::snowflake::Snowflake;
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    fn metadata() -> RunMetadata {
        let source = SourceDescriptor::new(Snowflake(9), "general", ChannelKind::Text);
        RunMetadata::new(source, &FetchSpec::new(), 2)
    }

    fn messages() -> Vec<Message> {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap();
        vec![
            Message::new(Snowflake(1), Author::new("Alice"), "Hello", ts)
                .with_reactions(vec![Reaction::new("🔥", 2)]),
            Message::new(Snowflake(2), Author::new("Bob"), "Hi", ts)
                .with_edited_at(ts)
                .with_pinned(true),
        ]
    }

    #[test]
    fn test_to_jsonl_one_object_per_line() {
        let jsonl = to_jsonl(&messages(), &metadata(), &OutputConfig::new()).unwrap();
        let lines: Vec<&str> = jsonl.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"author":"Alice","content":"Hello","reactions":["🔥 x2"]}"#);
        assert_eq!(lines[1], r#"{"author":"Bob","content":"Hi","pinned":true}"#);
    }

    #[test]
    fn test_to_jsonl_with_config() {
        let config = OutputConfig::new().with_ids().with_edited();
        let jsonl = to_jsonl(&messages(), &metadata(), &config).unwrap();
        let second: serde_json::Value = serde_json::from_str(jsonl.lines().nth(1).unwrap()).unwrap();

        assert_eq!(second["id"], 2);
        assert_eq!(second["edited"], "2024-06-15T12:30:00Z");
        assert!(second.get("timestamp").is_none());
    }

    #[test]
    fn test_write_jsonl_matches_to_jsonl() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = OutputConfig::all();

        write_jsonl(&messages(), &metadata(), &config, temp_file.path()).unwrap();

        let written = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(written, to_jsonl(&messages(), &metadata(), &config).unwrap());
    }
}
