//! In-memory transport for tests and offline replay.
//!
//! A channel is served in one of two ways:
//!
//! - **history**: a flat list of records, paged by id exactly like the live
//!   endpoint (strictly older than `before` or strictly newer than `after`,
//!   newest first either way)
//! - **script**: a queue of canned page results returned in order regardless
//!   of the cursor, which makes odd server behavior easy to reproduce
//!
//! Every call is recorded and can be inspected with
//! [`requests`](MemoryTransport::requests).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::Transport;
use crate::error::{ChatsweepError, Result};
use crate::parsing::discord::record_id;
use crate::snowflake::Snowflake;

/// One call observed by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRequest {
    Page {
        channel: Snowflake,
        before: Option<Snowflake>,
        limit: u8,
    },
    PageAfter {
        channel: Snowflake,
        after: Snowflake,
        limit: u8,
    },
    Pins {
        channel: Snowflake,
    },
    Breather,
}

#[derive(Debug)]
enum ChannelScript {
    History(Vec<Value>),
    Pages(VecDeque<Result<Vec<Value>>>),
}

/// Scripted [`Transport`].
///
/// ```
/// use chatsweep::client::{MemoryTransport, Transport};
/// use chatsweep::Snowflake;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> chatsweep::Result<()> {
/// let transport = MemoryTransport::new().with_history(
///     Snowflake(1),
///     vec![json!({ "id": "10", "author": {} }), json!({ "id": "20", "author": {} })],
/// );
///
/// let page = transport.messages_page(Snowflake(1), Some(Snowflake(20)), 100).await?;
/// assert_eq!(page.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryTransport {
    channels: Mutex<HashMap<Snowflake, ChannelScript>>,
    pins: HashMap<Snowflake, Vec<Value>>,
    forbidden: HashSet<Snowflake>,
    unauthorized: bool,
    latency: Duration,
    log: Mutex<Vec<TransportRequest>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `records` as the channel's full history. Order does not matter.
    #[must_use]
    pub fn with_history(self, channel: Snowflake, mut records: Vec<Value>) -> Self {
        records.sort_by_key(|r| std::cmp::Reverse(record_id(r)));
        self.channels
            .lock()
            .insert(channel, ChannelScript::History(records));
        self
    }

    /// Serves the given pages in order, then empty pages.
    #[must_use]
    pub fn with_pages(self, channel: Snowflake, pages: Vec<Vec<Value>>) -> Self {
        self.with_page_results(channel, pages.into_iter().map(Ok).collect())
    }

    /// Like [`with_pages`](Self::with_pages) but individual pages may fail.
    #[must_use]
    pub fn with_page_results(self, channel: Snowflake, pages: Vec<Result<Vec<Value>>>) -> Self {
        self.channels
            .lock()
            .insert(channel, ChannelScript::Pages(pages.into()));
        self
    }

    #[must_use]
    pub fn with_pins(mut self, channel: Snowflake, records: Vec<Value>) -> Self {
        self.pins.insert(channel, records);
        self
    }

    /// Every request for this channel fails with `PermissionDenied`.
    #[must_use]
    pub fn with_forbidden(mut self, channel: Snowflake) -> Self {
        self.forbidden.insert(channel);
        self
    }

    /// Every request fails with `Authentication`.
    #[must_use]
    pub fn with_unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    /// Each call sleeps this long before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// All calls observed so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.log.lock().clone()
    }

    /// Number of page requests made against `channel`.
    pub fn page_requests(&self, channel: Snowflake) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|r| match r {
                TransportRequest::Page { channel: c, .. }
                | TransportRequest::PageAfter { channel: c, .. } => *c == channel,
                _ => false,
            })
            .count()
    }

    async fn respond(&self, request: TransportRequest, channel: Option<Snowflake>) -> Result<()> {
        self.log.lock().push(request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unauthorized {
            return Err(ChatsweepError::authentication("/users/@me"));
        }
        if let Some(channel) = channel.filter(|c| self.forbidden.contains(c)) {
            return Err(ChatsweepError::permission_denied(format!(
                "/channels/{channel}/messages"
            )));
        }
        Ok(())
    }
}

fn unknown_channel(channel: Snowflake) -> ChatsweepError {
    ChatsweepError::remote_api(
        404,
        r#"{"message": "Unknown Channel", "code": 10003}"#,
        format!("/channels/{channel}/messages"),
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn messages_page(
        &self,
        channel: Snowflake,
        before: Option<Snowflake>,
        limit: u8,
    ) -> Result<Vec<Value>> {
        self.respond(
            TransportRequest::Page {
                channel,
                before,
                limit,
            },
            Some(channel),
        )
        .await?;

        let mut channels = self.channels.lock();
        match channels.get_mut(&channel) {
            Some(ChannelScript::History(records)) => Ok(records
                .iter()
                // records without a readable id only show up on the first page
                .filter(|r| match record_id(r) {
                    Some(id) => before.is_none_or(|b| id < b),
                    None => before.is_none(),
                })
                .take(usize::from(limit))
                .cloned()
                .collect()),
            Some(ChannelScript::Pages(pages)) => pages.pop_front().unwrap_or_else(|| Ok(Vec::new())),
            None => Err(unknown_channel(channel)),
        }
    }

    async fn messages_after(
        &self,
        channel: Snowflake,
        after: Snowflake,
        limit: u8,
    ) -> Result<Vec<Value>> {
        self.respond(
            TransportRequest::PageAfter {
                channel,
                after,
                limit,
            },
            Some(channel),
        )
        .await?;

        let mut channels = self.channels.lock();
        match channels.get_mut(&channel) {
            Some(ChannelScript::History(records)) => {
                let mut page: Vec<Value> = records
                    .iter()
                    .rev()
                    .filter(|r| record_id(r).is_some_and(|id| id > after))
                    .take(usize::from(limit))
                    .cloned()
                    .collect();
                page.reverse();
                Ok(page)
            }
            Some(ChannelScript::Pages(pages)) => pages.pop_front().unwrap_or_else(|| Ok(Vec::new())),
            None => Err(unknown_channel(channel)),
        }
    }

    async fn pins(&self, channel: Snowflake) -> Result<Vec<Value>> {
        self.respond(TransportRequest::Pins { channel }, Some(channel))
            .await?;
        Ok(self.pins.get(&channel).cloned().unwrap_or_default())
    }

    async fn breather(&self) {
        self.log.lock().push(TransportRequest::Breather);
    }
}
