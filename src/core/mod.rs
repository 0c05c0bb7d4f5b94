//! Core fetching and filtering logic for chatsweep.
//!
//! This module contains:
//! - [`models`] - Source descriptors, run metadata and output configuration
//! - [`filter`] - The filter set and the acceptance predicate
//! - [`cursor`] - Backwards pagination state
//! - [`fetcher`] - One source, paged, filtered and ordered
//! - [`sweep`] - Many sources under a concurrency cap
//! - [`output`] - Format writers (TXT, JSON, JSONL, CSV)
//!
//! # Quick Start
//!
//! ```rust
//! use chatsweep::client::MemoryTransport;
//! use chatsweep::core::{ChannelKind, FetchSpec, Fetcher, SourceDescriptor};
//! use chatsweep::Snowflake;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> chatsweep::Result<()> {
//! let fetcher = Fetcher::new(MemoryTransport::new().with_history(Snowflake(1), vec![]));
//! let source = SourceDescriptor::new(Snowflake(1), "general", ChannelKind::Text);
//!
//! let report = fetcher.fetch(&source, &FetchSpec::new().with_limit(10), None).await?;
//! assert!(report.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod fetcher;
pub mod filter;
pub mod models;
pub mod output;
pub mod sweep;

// Re-export main types for convenience
pub use cursor::{PageAnchor, PaginationCursor, StopReason};
pub use fetcher::{FetchReport, FetchStats, Fetcher};
pub use filter::{FetchSpec, UserFilterRule, accepts, apply_filters};
pub use models::{ChannelKind, OutputConfig, RunMetadata, SourceDescriptor};
pub use sweep::{SourceOutcome, SourceStatus, SweepReport, sweep};

// Re-export Message from the crate root
pub use crate::Message;
