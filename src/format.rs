//! Output format types and the exporter registry.
//!
//! [`OutputFormat`] names a format, an [`Exporter`] renders one, and an
//! [`ExporterRegistry`] maps the first to the second. The registry is built
//! once by the caller and passed around by reference.
//!
//! # Example
//!
//! ```rust,no_run
//! # fn example() -> chatsweep::Result<()> {
//! use chatsweep::format::{ExporterRegistry, OutputFormat};
//! use chatsweep::core::{ChannelKind, FetchSpec, OutputConfig, RunMetadata, SourceDescriptor};
//! use chatsweep::Snowflake;
//!
//! let registry = ExporterRegistry::with_defaults();
//! let source = SourceDescriptor::new(Snowflake(1), "general", ChannelKind::Text);
//! let metadata = RunMetadata::new(source, &FetchSpec::new(), 0);
//!
//! let path = registry.export(OutputFormat::Txt, &[], &metadata, &OutputConfig::new(), "exports".as_ref())?;
//! println!("Wrote {}", path.display());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::models::{OutputConfig, RunMetadata};
use crate::core::output;
use crate::error::{ChatsweepError, Result};
use crate::message::Message;

/// Output format for exports.
///
/// # Example
///
/// ```rust
/// use chatsweep::format::OutputFormat;
/// use std::str::FromStr;
///
/// let format = OutputFormat::from_str("ndjson").unwrap();
/// assert_eq!(format, OutputFormat::Jsonl);
/// assert_eq!(format.extension(), "jsonl");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum OutputFormat {
    /// Human-readable transcript (default)
    #[default]
    Txt,

    /// One JSON document with run metadata and messages
    Json,

    /// JSON Lines - one JSON object per message
    ///
    /// Also known as NDJSON.
    Jsonl,

    /// CSV with semicolon delimiter
    Csv,
}

impl OutputFormat {
    /// Returns the file extension for this format (without dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Csv => "csv",
        }
    }

    /// Returns all supported format names.
    pub fn all_names() -> &'static [&'static str] {
        &["txt", "json", "jsonl", "ndjson", "csv"]
    }

    /// Returns all available formats.
    pub fn all() -> &'static [OutputFormat] {
        &[
            OutputFormat::Txt,
            OutputFormat::Json,
            OutputFormat::Jsonl,
            OutputFormat::Csv,
        ]
    }

    /// Returns the MIME type for this format.
    ///
    /// ```rust
    /// use chatsweep::format::OutputFormat;
    ///
    /// assert_eq!(OutputFormat::Txt.mime_type(), "text/plain");
    /// ```
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "text/plain",
            OutputFormat::Json => "application/json",
            OutputFormat::Jsonl => "application/x-ndjson",
            OutputFormat::Csv => "text/csv",
        }
    }

    /// Detects format from a file path based on extension.
    pub fn from_path(path: &str) -> Result<Self> {
        let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();

        match ext.as_str() {
            "txt" | "log" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ChatsweepError::invalid_format(
                "output",
                format!("Unknown file extension: '.{ext}'. Expected one of: txt, json, jsonl, csv"),
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Txt => write!(f, "TXT"),
            OutputFormat::Json => write!(f, "JSON"),
            OutputFormat::Jsonl => write!(f, "JSONL"),
            OutputFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!(
                "Unknown format: '{}'. Expected one of: {}",
                s,
                OutputFormat::all_names().join(", ")
            )),
        }
    }
}

/// Renders a result set in one format.
pub trait Exporter: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn render(&self, messages: &[Message], metadata: &RunMetadata, config: &OutputConfig) -> Result<String>;
}

pub struct TxtExporter;

impl Exporter for TxtExporter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Txt
    }

    fn render(&self, messages: &[Message], metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
        output::to_txt(messages, metadata, config)
    }
}

pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn render(&self, messages: &[Message], metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
        output::to_json(messages, metadata, config)
    }
}

pub struct JsonlExporter;

impl Exporter for JsonlExporter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jsonl
    }

    fn render(&self, messages: &[Message], metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
        output::to_jsonl(messages, metadata, config)
    }
}

#[cfg(feature = "csv-output")]
pub struct CsvExporter;

#[cfg(feature = "csv-output")]
impl Exporter for CsvExporter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn render(&self, messages: &[Message], metadata: &RunMetadata, config: &OutputConfig) -> Result<String> {
        output::to_csv(messages, metadata, config)
    }
}

/// Format-to-exporter table.
#[derive(Default)]
pub struct ExporterRegistry {
    exporters: HashMap<OutputFormat, Box<dyn Exporter>>,
}

impl ExporterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every exporter compiled into this build.
    pub fn with_defaults() -> Self {
        let registry = Self::new()
            .with_exporter(TxtExporter)
            .with_exporter(JsonExporter)
            .with_exporter(JsonlExporter);
        #[cfg(feature = "csv-output")]
        let registry = registry.with_exporter(CsvExporter);
        registry
    }

    /// Registers `exporter` under its own format, replacing any previous one.
    #[must_use]
    pub fn with_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporters.insert(exporter.format(), Box::new(exporter));
        self
    }

    pub fn get(&self, format: OutputFormat) -> Option<&dyn Exporter> {
        self.exporters.get(&format).map(|e| e.as_ref())
    }

    pub fn supports(&self, format: OutputFormat) -> bool {
        self.exporters.contains_key(&format)
    }

    /// Renders to a string without touching the filesystem.
    pub fn render(
        &self,
        format: OutputFormat,
        messages: &[Message],
        metadata: &RunMetadata,
        config: &OutputConfig,
    ) -> Result<String> {
        let exporter = self.get(format).ok_or_else(|| {
            ChatsweepError::invalid_format(
                "output",
                format!("Output format {format} is not available in this build"),
            )
        })?;
        exporter.render(messages, metadata, config)
    }

    /// Writes `dir/<file stem>.<ext>` and returns its path.
    ///
    /// The directory is created if missing.
    pub fn export(
        &self,
        format: OutputFormat,
        messages: &[Message],
        metadata: &RunMetadata,
        config: &OutputConfig,
        dir: &Path,
    ) -> Result<PathBuf> {
        let rendered = self.render(format, messages, metadata, config)?;

        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.{}", metadata.file_stem(), format.extension()));
        fs::write(&path, rendered)?;

        debug!(path = %path.display(), format = %format, messages = messages.len(), "Export written");
        Ok(path)
    }
}
