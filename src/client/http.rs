//! Live REST transport.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use super::retry::RateLimiter;
use super::{ApiResponse, Transport};
use crate::core::models::SourceDescriptor;
use crate::error::{ChatsweepError, Result};
use crate::parsing::discord::{RawChannel, RawGuild, RawUser};
use crate::snowflake::Snowflake;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// DM channel type codes (one-to-one and group).
const DM_TYPES: [u8; 2] = [1, 3];
/// Guild text and announcement channel type codes.
const TEXT_TYPES: [u8; 2] = [0, 5];

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// A user account token, sent as-is.
    User(String),
    /// A bot token, sent with the `Bot ` prefix.
    Bot(String),
}

impl Credential {
    /// Value of the `Authorization` header.
    pub fn header_value(&self) -> String {
        match self {
            Credential::User(token) => token.clone(),
            Credential::Bot(token) => format!("Bot {token}"),
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Credential::Bot(_))
    }
}

// Tokens never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::User(_) => f.write_str("Credential::User(***)"),
            Credential::Bot(_) => f.write_str("Credential::Bot(***)"),
        }
    }
}

/// [`Transport`] over the live API.
///
/// Cloning is cheap and every clone shares the same [`RateLimiter`], which is
/// how concurrent sessions coordinate their pacing.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
    user_agent: String,
    limiter: Arc<RateLimiter>,
}

impl HttpTransport {
    /// Creates a transport with the default base URL and retry policy.
    pub fn new(credential: Credential) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_API_BASE.to_string(),
            credential,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            limiter: Arc::new(RateLimiter::default()),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Shares an existing limiter instead of the transport's own.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        let url = format!("{}{endpoint}", self.base_url);
        let auth = self.credential.header_value();
        let (url, auth, user_agent, client) = (&url, &auth, &self.user_agent, &self.client);

        debug!(endpoint, ?query, "GET");
        self.limiter
            .execute(endpoint, move || async move {
                let response = client
                    .get(url)
                    .header(AUTHORIZATION, auth)
                    .header(USER_AGENT, user_agent)
                    .query(query)
                    .send()
                    .await?;
                let status = response.status().as_u16();
                let body = response.text().await?;
                Ok::<_, ChatsweepError>(ApiResponse { status, body })
            })
            .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.get(endpoint, &[]).await?.json()
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// The authenticated account. Also the cheapest way to validate a token.
    pub async fn current_user(&self) -> Result<RawUser> {
        self.get_json("/users/@me").await
    }

    /// Every DM and group DM channel of the account.
    pub async fn dm_channels(&self) -> Result<Vec<RawChannel>> {
        self.get_json("/users/@me/channels").await
    }

    /// Every guild the account is a member of.
    pub async fn guilds(&self) -> Result<Vec<RawGuild>> {
        self.get_json("/users/@me/guilds").await
    }

    pub async fn guild_channels(&self, guild: Snowflake) -> Result<Vec<RawChannel>> {
        self.get_json(&format!("/guilds/{guild}/channels")).await
    }

    /// Descriptors for every DM and group DM, sorted by name.
    pub async fn dm_sources(&self) -> Result<Vec<SourceDescriptor>> {
        let channels = self.dm_channels().await?;
        Ok(sorted_sources(&channels, &DM_TYPES, None))
    }

    /// Descriptors for a guild's text and announcement channels, sorted by name.
    pub async fn text_sources(&self, guild: &RawGuild) -> Result<Vec<SourceDescriptor>> {
        let channels = self.guild_channels(guild.id).await?;
        Ok(sorted_sources(&channels, &TEXT_TYPES, Some(guild)))
    }
}

fn sorted_sources(
    channels: &[RawChannel],
    kinds: &[u8],
    guild: Option<&RawGuild>,
) -> Vec<SourceDescriptor> {
    let mut sources: Vec<_> = channels
        .iter()
        .filter(|c| kinds.contains(&c.kind))
        .map(|c| SourceDescriptor::from_channel(c, guild))
        .collect();
    sources.sort_by_key(|s| s.channel_name.to_lowercase());
    sources
}

#[async_trait]
impl Transport for HttpTransport {
    async fn messages_page(
        &self,
        channel: Snowflake,
        before: Option<Snowflake>,
        limit: u8,
    ) -> Result<Vec<Value>> {
        let endpoint = format!("/channels/{channel}/messages");
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        self.get(&endpoint, &query).await?.json()
    }

    async fn messages_after(
        &self,
        channel: Snowflake,
        after: Snowflake,
        limit: u8,
    ) -> Result<Vec<Value>> {
        let endpoint = format!("/channels/{channel}/messages");
        let query = [("limit", limit.to_string()), ("after", after.to_string())];
        self.get(&endpoint, &query).await?.json()
    }

    async fn pins(&self, channel: Snowflake) -> Result<Vec<Value>> {
        self.get_json(&format!("/channels/{channel}/pins")).await
    }

    async fn breather(&self) {
        self.limiter.breather().await;
    }
}
