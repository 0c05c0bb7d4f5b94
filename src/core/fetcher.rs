//! The fetch loop.
//!
//! [`Fetcher::fetch`] walks a channel one page at a time:
//!
//! 1. request the page past the cursor
//! 2. normalize every record, skipping malformed ones
//! 3. stop at the first record beyond the far end of the date window, skip
//!    records before its near end, and run the remaining ones through
//!    [`accepts`](crate::core::filter::accepts)
//! 4. stop once `limit` records were accepted, or when the server runs dry
//!
//! Without a limit the walk goes backwards from `date_to` and stops at
//! `date_from`. With a limit it goes forwards from `date_from` and stops at
//! `date_to`, so the result holds the oldest `limit` matches.
//!
//! The result is sorted ascending by `(created_at, id)`.

use std::collections::HashSet;
use std::future::Future;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{MAX_PAGE_SIZE, RetryPolicy, Transport};
use crate::core::cursor::{PageAnchor, PaginationCursor, StopReason};
use crate::core::filter::{FetchSpec, accepts};
use crate::core::models::{RunMetadata, SourceDescriptor};
use crate::error::{ChatsweepError, Result};
use crate::message::Message;
use crate::parsing::discord::{normalize, record_id};
use crate::progress::{PROGRESS_INTERVAL, Progress, ProgressCallback};
use crate::snowflake::Snowflake;

/// Counters describing one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Records received, including skipped and rejected ones.
    pub scanned: usize,
    /// Records in the result.
    pub accepted: usize,
    /// Records dropped because they could not be normalized.
    pub skipped_records: usize,
    /// Records dropped because their id was already seen.
    pub duplicates: usize,
    /// Pages requested.
    pub pages: usize,
    pub stop: StopReason,
}

/// Result of [`Fetcher::fetch`].
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Accepted messages, ascending by `(created_at, id)`.
    pub messages: Vec<Message>,
    pub metadata: RunMetadata,
    pub stats: FetchStats,
}

impl FetchReport {
    pub fn into_parts(self) -> (Vec<Message>, RunMetadata) {
        (self.messages, self.metadata)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Running state of one fetch session.
struct Session<'a> {
    spec: &'a FetchSpec,
    channel: Snowflake,
    progress: Option<&'a ProgressCallback>,
    progress_interval: usize,
    seen: HashSet<Snowflake>,
    messages: Vec<Message>,
    scanned: usize,
    skipped_records: usize,
    duplicates: usize,
    pages: usize,
}

impl<'a> Session<'a> {
    fn new(
        spec: &'a FetchSpec,
        channel: Snowflake,
        progress: Option<&'a ProgressCallback>,
        progress_interval: usize,
    ) -> Self {
        Self {
            spec,
            channel,
            progress,
            progress_interval,
            seen: HashSet::new(),
            messages: Vec::new(),
            scanned: 0,
            skipped_records: 0,
            duplicates: 0,
            pages: 0,
        }
    }

    fn report(&self) {
        if let Some(callback) = self.progress {
            callback(Progress::new(self.scanned, self.messages.len()));
        }
    }

    /// Counts a record as scanned, normalizes it and drops duplicates.
    fn admit(&mut self, raw: &serde_json::Value) -> Option<Message> {
        self.scanned += 1;
        if self.progress_interval > 0 && self.scanned % self.progress_interval == 0 {
            self.report();
        }

        let msg = match normalize(raw) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(channel = %self.channel, error = %err, "Skipping malformed record");
                self.skipped_records += 1;
                return None;
            }
        };

        if !self.seen.insert(msg.id()) {
            debug!(channel = %self.channel, id = %msg.id(), "Dropping duplicate record");
            self.duplicates += 1;
            return None;
        }
        Some(msg)
    }

    /// Runs one history page through the filters, in walk order.
    ///
    /// Returns the stop reason if the page ended the walk.
    fn consume_page(&mut self, page: &[serde_json::Value], forward: bool) -> Option<StopReason> {
        for raw in page {
            let Some(msg) = self.admit(raw) else {
                continue;
            };

            let ts = msg.created_at();
            let too_old = self.spec.date_from.is_some_and(|from| ts < from);
            let too_new = self.spec.date_to.is_some_and(|to| ts > to);
            if (too_old && !forward) || (too_new && forward) {
                return Some(StopReason::DateBoundary);
            }
            if too_old || too_new {
                continue;
            }
            if !accepts(&msg, self.spec) {
                continue;
            }

            self.messages.push(msg);
            if self.spec.limit_reached(self.messages.len()) {
                return Some(StopReason::Limit);
            }
        }
        None
    }

    fn finish(mut self, source: &SourceDescriptor, stop: StopReason) -> FetchReport {
        self.report();
        self.messages.sort_by_key(Message::sort_key);

        let stats = FetchStats {
            scanned: self.scanned,
            accepted: self.messages.len(),
            skipped_records: self.skipped_records,
            duplicates: self.duplicates,
            pages: self.pages,
            stop,
        };
        info!(
            channel = %source.channel_id,
            scanned = stats.scanned,
            accepted = stats.accepted,
            skipped = stats.skipped_records,
            pages = stats.pages,
            stop = %stop,
            "Fetch finished"
        );

        FetchReport {
            metadata: RunMetadata::new(source.clone(), self.spec, self.messages.len()),
            messages: self.messages,
            stats,
        }
    }
}

/// Drives fetch sessions against a [`Transport`].
///
/// # Example
///
/// ```
/// use chatsweep::client::MemoryTransport;
/// use chatsweep::core::{FetchSpec, Fetcher, SourceDescriptor, ChannelKind};
/// use chatsweep::Snowflake;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> chatsweep::Result<()> {
/// let transport = MemoryTransport::new().with_history(
///     Snowflake(1),
///     vec![json!({ "id": "4194304", "author": { "username": "alice" }, "content": "hi" })],
/// );
/// let fetcher = Fetcher::new(transport);
/// let source = SourceDescriptor::new(Snowflake(1), "general", ChannelKind::Text);
///
/// let report = fetcher.fetch(&source, &FetchSpec::new(), None).await?;
/// assert_eq!(report.messages.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Fetcher<T> {
    transport: T,
    cancel: CancellationToken,
    page_size: u8,
    burst_every: usize,
    progress_interval: usize,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cancel: CancellationToken::new(),
            page_size: MAX_PAGE_SIZE,
            burst_every: RetryPolicy::default().burst_every,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Aborts in-flight fetches when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Records per page, clamped to `1..=100`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u8) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Scanned records between breathers. Zero disables them.
    #[must_use]
    pub fn with_burst_every(mut self, burst_every: usize) -> Self {
        self.burst_every = burst_every;
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetches the messages of `source` that satisfy `spec`.
    ///
    /// # Errors
    ///
    /// Transport errors propagate unchanged. Malformed records are skipped
    /// and counted in [`FetchStats::skipped_records`] instead. Cancellation
    /// gives [`ChatsweepError::Cancelled`] and discards partial results.
    pub async fn fetch(
        &self,
        source: &SourceDescriptor,
        spec: &FetchSpec,
        progress: Option<&ProgressCallback>,
    ) -> Result<FetchReport> {
        let session = Session::new(spec, source.channel_id, progress, self.progress_interval);
        if spec.pinned_only {
            self.fetch_pinned(source, session).await
        } else {
            self.fetch_history(source, session).await
        }
    }

    async fn fetch_history(
        &self,
        source: &SourceDescriptor,
        mut session: Session<'_>,
    ) -> Result<FetchReport> {
        // a limit keeps the oldest matches, so walk forwards from `date_from`
        let mut cursor = if session.spec.limit.is_some() {
            PaginationCursor::forward(self.page_size, session.spec.date_from)
        } else {
            PaginationCursor::seeded(self.page_size, session.spec.date_to)
        };
        let mut breathers = 0;

        let stop = loop {
            let mut page = self
                .guarded(self.request_page(source.channel_id, &cursor))
                .await??;
            session.pages += 1;
            debug!(
                channel = %source.channel_id,
                page = session.pages,
                records = page.len(),
                anchor = ?cursor.anchor(),
                "Fetched page"
            );

            // pages arrive newest first in both directions
            if cursor.is_forward() {
                page.sort_by_key(record_id);
            }
            if let Some(stop) = session.consume_page(&page, cursor.is_forward()) {
                break stop;
            }
            if let Err(stop) = cursor.advance(&page) {
                break stop;
            }

            if self.burst_every > 0 && session.scanned / self.burst_every > breathers {
                breathers = session.scanned / self.burst_every;
                self.guarded(self.transport.breather()).await?;
            }
        };

        Ok(session.finish(source, stop))
    }

    async fn fetch_pinned(
        &self,
        source: &SourceDescriptor,
        mut session: Session<'_>,
    ) -> Result<FetchReport> {
        let pins = self
            .guarded(self.transport.pins(source.channel_id))
            .await??;
        session.pages = 1;

        for raw in &pins {
            let Some(msg) = session.admit(raw) else {
                continue;
            };
            let msg = msg.into_pinned();
            if session.spec.within_bounds(&msg) && accepts(&msg, session.spec) {
                session.messages.push(msg);
            }
        }

        session.messages.sort_by_key(Message::sort_key);
        if let Some(limit) = session.spec.limit {
            session.messages.truncate(limit);
        }
        Ok(session.finish(source, StopReason::PinnedSet))
    }

    async fn request_page(
        &self,
        channel: Snowflake,
        cursor: &PaginationCursor,
    ) -> Result<Vec<serde_json::Value>> {
        match cursor.anchor() {
            PageAnchor::Before(before) => {
                self.transport
                    .messages_page(channel, before, cursor.page_size())
                    .await
            }
            PageAnchor::After(after) => {
                self.transport
                    .messages_after(channel, after, cursor.page_size())
                    .await
            }
        }
    }

    /// Races `fut` against cancellation.
    async fn guarded<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ChatsweepError::Cancelled),
            out = fut => Ok(out),
        }
    }
}
