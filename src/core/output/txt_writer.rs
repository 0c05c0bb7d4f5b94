//! Plain-text log writer.
//!
//! Produces a human-readable transcript: a boxed header describing the run,
//! one separator line per calendar day, and every message with its edits,
//! attachments, embeds and reactions indented underneath.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::core::models::{OutputConfig, RunMetadata};
use crate::error::Result;
use crate::message::{Embed, Message};

const RULE_WIDTH: usize = 72;
const DAY_SEPARATOR_WIDTH: usize = 50;
const INDENT: &str = "    ";

fn utc_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Lines describing the run, without indentation.
fn header_lines(metadata: &RunMetadata) -> Vec<String> {
    let mut lines = vec![
        format!("Source: {}", metadata.source.label()),
        format!("Exported: {}", utc_stamp(metadata.produced_at)),
        format!("Total messages: {}", metadata.total_messages),
    ];
    if let Some(from) = metadata.date_from {
        lines.push(format!("From: {}", utc_stamp(from)));
    }
    if let Some(to) = metadata.date_to {
        lines.push(format!("To: {}", utc_stamp(to)));
    }
    if !metadata.user_rules.is_empty() {
        let labels: Vec<String> = metadata.user_rules.iter().map(|r| r.label()).collect();
        lines.push(format!("Username filter: {}", labels.join(", ")));
    }
    if let Some(keyword) = &metadata.keyword {
        lines.push(format!("Keyword filter: {keyword}"));
    }
    lines
}

fn day_separator(ts: DateTime<Utc>) -> String {
    let date = ts.format("%A, %B %d, %Y").to_string();
    let pad = DAY_SEPARATOR_WIDTH.saturating_sub(date.chars().count());
    format!("--- {date} {}---", "─".repeat(pad))
}

fn push_embed(lines: &mut Vec<String>, embed: &Embed) {
    lines.push(format!("{INDENT}┌─ Embed ─────────────────────────"));
    if let Some(title) = &embed.title {
        lines.push(format!("{INDENT}│ Title: {title}"));
    }
    if let Some(description) = &embed.description {
        for line in description.split('\n') {
            lines.push(format!("{INDENT}│ {line}"));
        }
    }
    if let Some(url) = &embed.url {
        lines.push(format!("{INDENT}│ URL: {url}"));
    }
    for field in &embed.fields {
        lines.push(format!("{INDENT}│ {}: {}", field.name, field.value));
    }
    lines.push(format!("{INDENT}└──────────────────────────────────"));
}

fn push_message(lines: &mut Vec<String>, msg: &Message, config: &OutputConfig) {
    let mut heading = format!("[{}] {}", msg.created_at().format("%H:%M:%S"), msg.author().display());
    if config.include_ids {
        heading.push_str(&format!(" <{}>", msg.id()));
    }
    if msg.is_pinned() {
        heading.push_str(" 📌");
    }
    if let Some(reply_to) = msg.reply_to() {
        heading.push_str(&format!(" (replying to {reply_to})"));
    }
    lines.push(heading);

    if !msg.content().is_empty() {
        for line in msg.content().split('\n') {
            lines.push(format!("{INDENT}{line}"));
        }
    }

    if let Some(edited) = msg.edited_at() {
        lines.push(format!("{INDENT}(edited {})", utc_stamp(edited)));
    }

    for attachment in msg.attachments() {
        lines.push(format!(
            "{INDENT}📎 {} ({:.1} KB)",
            attachment.filename,
            attachment.size_kb()
        ));
        lines.push(format!("{INDENT}   {}", attachment.url));
    }

    for embed in msg.embeds() {
        push_embed(lines, embed);
    }

    if !msg.reactions().is_empty() {
        let reactions: Vec<String> = msg
            .reactions()
            .iter()
            .map(|r| format!("{} ×{}", r.emoji, r.count))
            .collect();
        lines.push(format!("{INDENT}Reactions: {}", reactions.join("  ")));
    }

    lines.push(String::new());
}

/// Writes messages to a plain-text log file.
pub fn write_txt(
    messages: &[Message],
    metadata: &RunMetadata,
    config: &OutputConfig,
    output_path: &Path,
) -> Result<()> {
    let txt = to_txt(messages, metadata, config)?;
    let mut file = File::create(output_path)?;
    file.write_all(txt.as_bytes())?;
    Ok(())
}

/// Renders messages as a plain-text log.
///
/// The transcript always carries timestamps, replies and edits. Only
/// [`include_ids`](OutputConfig::include_ids) changes the layout, adding
/// `<id>` after the author.
///
/// # Format
/// ```text
/// ========================================================================
///   DISCORD LOG EXPORT
/// ========================================================================
///   Source: Rust › #general
///   ...
/// ========================================================================
///
/// --- Monday, January 15, 2024 ───────────────────────────---
///
/// [10:30:00] alice
///     Hello!
/// ```
pub fn to_txt(messages: &[Message], metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![rule.clone(), "  DISCORD LOG EXPORT".to_string(), rule.clone()];
    lines.extend(header_lines(metadata).into_iter().map(|h| format!("  {h}")));
    lines.push(rule.clone());
    lines.push(String::new());

    let mut current_day = None;
    for msg in messages {
        let day = msg.created_at().date_naive();
        if current_day != Some(day) {
            lines.push(day_separator(msg.created_at()));
            lines.push(String::new());
            current_day = Some(day);
        }
        push_message(&mut lines, msg, config);
    }

    lines.push(rule.clone());
    lines.push(format!("  End of export — {} messages", metadata.total_messages));
    lines.push(rule);

    Ok(lines.join("\n"))
}
