//! Remote history access.
//!
//! [`Transport`] is the only thing the fetch loop knows about the remote side.
//! Two implementations ship with the crate:
//!
//! - [`HttpTransport`] talks to the live REST API through a shared
//!   [`RateLimiter`]
//! - [`MemoryTransport`] serves a scripted history from memory, for tests and
//!   offline replay

pub mod http;
pub mod memory;
pub mod retry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ChatsweepError, Result};
use crate::snowflake::Snowflake;

pub use http::{Credential, HttpTransport};
pub use memory::{MemoryTransport, TransportRequest};
pub use retry::{RateLimiter, RetryPolicy};

/// Maximum page size the history endpoint accepts.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `200` with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(ChatsweepError::from)
    }
}

/// Read access to one platform's message history.
///
/// Pages come back newest-first as raw wire records; normalization is the
/// caller's job.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Up to `limit` records strictly older than `before` (or the newest
    /// records when `before` is `None`), newest first.
    async fn messages_page(
        &self,
        channel: Snowflake,
        before: Option<Snowflake>,
        limit: u8,
    ) -> Result<Vec<Value>>;

    /// Up to `limit` records strictly newer than `after`: the oldest ones
    /// past it, still returned newest first.
    async fn messages_after(
        &self,
        channel: Snowflake,
        after: Snowflake,
        limit: u8,
    ) -> Result<Vec<Value>>;

    /// The channel's pinned records.
    async fn pins(&self, channel: Snowflake) -> Result<Vec<Value>>;

    /// Backs off after a burst of records. Does nothing by default.
    async fn breather(&self) {}
}
