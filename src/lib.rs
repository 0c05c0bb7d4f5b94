//! # Chatsweep
//!
//! A Rust library for pulling message history out of Discord through its
//! REST API, filtering it, and archiving it in LLM- and human-friendly
//! formats.
//!
//! ## Overview
//!
//! Chatsweep walks a channel's history backwards, one page at a time, while
//! staying inside the platform's rate limits:
//! - **Pagination** stops as soon as the date window or the message limit
//!   makes further pages useless
//! - **Rate limits** are handled by a shared [`RateLimiter`](client::RateLimiter)
//!   that paces requests and honours `retry_after`
//! - **Filters** cover date windows, per-user rules with their own windows,
//!   keywords, bots and pinned messages
//! - **Output** is ordered oldest first and written as TXT, JSON, JSONL or CSV
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatsweep::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = HttpTransport::new(Credential::Bot("token".into()))?;
//!     let fetcher = Fetcher::new(transport);
//!
//!     let spec = FetchSpec::new()
//!         .with_date_from("2024-01-01")?
//!         .with_user_rule("alice".parse()?)
//!         .with_limit(500);
//!
//!     let source = SourceDescriptor::new(Snowflake(1234), "general", ChannelKind::Text);
//!     let report = fetcher.fetch(&source, &spec, None).await?;
//!
//!     let registry = ExporterRegistry::with_defaults();
//!     let path = registry.export(
//!         OutputFormat::Txt,
//!         &report.messages,
//!         &report.metadata,
//!         &OutputConfig::new(),
//!         "exports".as_ref(),
//!     )?;
//!     println!("Saved {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`client`] — The [`Transport`](client::Transport) seam
//!   - [`HttpTransport`](client::HttpTransport) — live REST API
//!   - [`MemoryTransport`](client::MemoryTransport) — scripted, for tests
//!   - [`RateLimiter`](client::RateLimiter), [`RetryPolicy`](client::RetryPolicy)
//! - [`core`] — Fetching and filtering
//!   - [`core::fetcher`] — [`Fetcher`](core::Fetcher), [`FetchReport`](core::FetchReport)
//!   - [`core::filter`] — [`FetchSpec`](core::FetchSpec), [`UserFilterRule`](core::UserFilterRule)
//!   - [`core::sweep`] — many sources in one run
//!   - [`core::output`] — format writers
//! - [`parsing`] — wire records to [`Message`]
//! - [`format`] — [`OutputFormat`](format::OutputFormat) and the exporter registry
//! - [`config`] — [`AppConfig`](config::AppConfig), loaded from the environment
//! - `cli` — clap argument definitions (`cli` feature)
//! - [`error`] — Unified error types ([`ChatsweepError`], [`Result`])
//! - [`prelude`] — Convenient re-exports

#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod message;
pub mod parsing;
pub mod progress;
pub mod snowflake;

// Re-export the main types at the crate root for convenience
pub use error::{ChatsweepError, Result};
pub use message::{Attachment, Author, Embed, EmbedField, Message, Reaction};
pub use snowflake::Snowflake;

/// Convenient re-exports for common usage.
///
/// Import everything you need with a single line:
///
/// ```rust
/// use chatsweep::prelude::*;
/// ```
pub mod prelude {
    // Core message types
    pub use crate::message::{Attachment, Author, Embed, Message, Reaction};
    pub use crate::snowflake::Snowflake;

    // Error types
    pub use crate::error::{ChatsweepError, Result};

    // Transports
    pub use crate::client::{Credential, HttpTransport, MemoryTransport, RateLimiter, RetryPolicy, Transport};

    // Fetching
    pub use crate::core::{
        ChannelKind, FetchReport, FetchSpec, Fetcher, OutputConfig, RunMetadata, SourceDescriptor,
        StopReason, SweepReport, UserFilterRule, accepts, apply_filters, sweep,
    };

    // Output
    pub use crate::format::{Exporter, ExporterRegistry, OutputFormat};

    // Configuration and progress
    pub use crate::config::AppConfig;
    pub use crate::progress::{Progress, ProgressCallback};
}
