//! JSON output writer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::{ExportDocument, ExportRecord};
use crate::core::models::{OutputConfig, RunMetadata};
use crate::error::Result;
use crate::message::Message;

/// Writes the run metadata and messages to a JSON file.
///
/// # Format
/// ```json
/// {
///   "metadata": { "source": { ... }, "total_messages": 2, ... },
///   "messages": [
///     {"author": "Alice", "content": "Hello"},
///     {"author": "Bob", "content": "Hi"}
///   ]
/// }
/// ```
pub fn write_json(
    messages: &[Message],
    metadata: &RunMetadata,
    config: &OutputConfig,
    output_path: &Path,
) -> Result<()> {
    let json = to_json(messages, metadata, config)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Converts messages to a pretty-printed JSON document.
///
/// Same format as `write_json`, but returns a String instead of writing to file.
pub fn to_json(messages: &[Message], metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
    let document = ExportDocument {
        metadata,
        messages: messages
            .iter()
            .map(|m| ExportRecord::from_message(m, config))
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::FetchSpec;
    use crate::core::models::{ChannelKind, SourceDescriptor};
    use crate::message::{Attachment, Author};
    use crate::snowflake::Snowflake;
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    fn sample() -> (Vec<Message>, RunMetadata) {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap();
        let messages = vec![
            Message::new(Snowflake(123), Author::new("Alice"), "Hello", ts)
                .with_reply_to(Snowflake(100))
                .with_attachments(vec![Attachment::new("a.png", "https://cdn/a.png", 10)]),
            Message::new(Snowflake(124), Author::new("Bob"), "Hi", ts),
        ];
        let source = SourceDescriptor::new(Snowflake(9), "general", ChannelKind::Text);
        let metadata = RunMetadata::new(source, &FetchSpec::new(), messages.len());
        (messages, metadata)
    }

    #[test]
    fn test_to_json_basic() {
        let (messages, metadata) = sample();
        let json = to_json(&messages, &metadata, &OutputConfig::new()).unwrap();

        assert!(json.contains(r#""author": "Alice""#));
        assert!(json.contains(r#""content": "Hello""#));
        assert!(json.contains(r#""https://cdn/a.png""#));
        assert!(!json.contains("timestamp"));
        assert!(!json.contains("reply_to"));
    }

    #[test]
    fn test_to_json_document_shape() {
        let (messages, metadata) = sample();
        let json = to_json(&messages, &metadata, &OutputConfig::all()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["total_messages"], 2);
        assert_eq!(value["metadata"]["source"]["channel_name"], "general");
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["messages"][0]["id"], 123);
        assert_eq!(value["messages"][0]["reply_to"], 100);
        assert_eq!(value["messages"][0]["timestamp"], "2024-06-15T12:30:00Z");
    }

    #[test]
    fn test_write_json_basic() {
        let (messages, metadata) = sample();
        let temp_file = NamedTempFile::new().unwrap();

        write_json(&messages, &metadata, &OutputConfig::new(), temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains(r#""author": "Bob""#));
        assert!(content.contains(r#""metadata""#));
    }
}
