//! Filter messages by date range, author, bot flag and keyword.
//!
//! This module provides [`FetchSpec`] for defining filter criteria,
//! [`accepts`] for evaluating a single message and [`apply_filters`] for
//! filtering message collections.
//!
//! # Filter Types
//!
//! | Filter | Method | Description |
//! |--------|--------|-------------|
//! | Date from | [`with_date_from`](FetchSpec::with_date_from) | Messages on or after date |
//! | Date to | [`with_date_to`](FetchSpec::with_date_to) | Messages on or before date |
//! | User rules | [`with_user_rule`](FetchSpec::with_user_rule) | Authors matching any rule |
//! | Keyword | [`with_keyword`](FetchSpec::with_keyword) | Content contains keyword |
//! | Bots | [`with_include_bots`](FetchSpec::with_include_bots) | Drop bot authors |
//!
//! # Examples
//!
//! ## Per-user date windows
//!
//! ```
//! use chatsweep::core::filter::{FetchSpec, UserFilterRule, accepts};
//! use chatsweep::{Author, Message, Snowflake};
//! use chrono::{TimeZone, Utc};
//!
//! # fn main() -> chatsweep::Result<()> {
//! let spec = FetchSpec::new()
//!     .with_user_rule(UserFilterRule::new("alice"))
//!     .with_user_rule("bob@2024-06-01..".parse()?);
//!
//! let may = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let msg = Message::new(Snowflake(1), Author::new("bob999"), "hi", may);
//!
//! // bob's own window starts in June
//! assert!(!accepts(&msg, &spec));
//! # Ok(())
//! # }
//! ```
//!
//! # Behavior Notes
//!
//! - User rules are combined with OR logic, every other filter with AND
//! - Each rule bound falls back to the global bound when unset
//! - Author and keyword matching are case-insensitive

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Message;
use crate::error::{ChatsweepError, Result};

/// A per-author filter rule.
///
/// Matches messages whose author display name or username contains
/// `name_pattern` (case-insensitive). Optional bounds override the global
/// date range for this author only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilterRule {
    pub name_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
}

impl UserFilterRule {
    /// Creates a rule with no date overrides.
    pub fn new(name_pattern: impl Into<String>) -> Self {
        Self {
            name_pattern: name_pattern.into(),
            date_from: None,
            date_to: None,
        }
    }

    /// Sets the rule's start date (`YYYY-MM-DD` or RFC 3339).
    pub fn with_date_from(mut self, date_str: &str) -> Result<Self> {
        self.date_from = Some(parse_date_start(date_str)?);
        Ok(self)
    }

    /// Sets the rule's end date (`YYYY-MM-DD` or RFC 3339).
    pub fn with_date_to(mut self, date_str: &str) -> Result<Self> {
        self.date_to = Some(parse_date_end(date_str)?);
        Ok(self)
    }

    /// Human-readable rule description, e.g. `"bob" from 2024-06-01`.
    pub fn label(&self) -> String {
        let mut label = format!("\"{}\"", self.name_pattern);
        if let Some(from) = self.date_from {
            label.push_str(&format!(" from {}", from.format("%Y-%m-%d")));
        }
        if let Some(to) = self.date_to {
            label.push_str(&format!(" to {}", to.format("%Y-%m-%d")));
        }
        label
    }

    /// Returns `true` if the author's display name or username contains the pattern.
    pub fn matches_author(&self, msg: &Message) -> bool {
        let pattern = self.name_pattern.to_lowercase();
        let author = msg.author();
        author.display_name().to_lowercase().contains(&pattern)
            || author.username().to_lowercase().contains(&pattern)
    }

    /// Returns `true` if the author matches and the message falls inside this
    /// rule's window. Unset bounds fall back to `global_from` / `global_to`.
    pub fn matches(
        &self,
        msg: &Message,
        global_from: Option<DateTime<Utc>>,
        global_to: Option<DateTime<Utc>>,
    ) -> bool {
        if !self.matches_author(msg) {
            return false;
        }
        let ts = msg.created_at();
        if self.date_from.or(global_from).is_some_and(|from| ts < from) {
            return false;
        }
        if self.date_to.or(global_to).is_some_and(|to| ts > to) {
            return false;
        }
        true
    }
}

impl fmt::Display for UserFilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Parses `pattern`, `pattern@FROM..`, `pattern@..TO` or `pattern@FROM..TO`.
///
/// ```
/// use chatsweep::core::filter::UserFilterRule;
///
/// let rule: UserFilterRule = "bob@2024-06-01..2024-06-30".parse().unwrap();
/// assert_eq!(rule.name_pattern, "bob");
/// assert!(rule.date_from.is_some() && rule.date_to.is_some());
/// ```
impl FromStr for UserFilterRule {
    type Err = ChatsweepError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (pattern, range) = match s.rsplit_once('@') {
            Some((pattern, range)) if range.contains("..") => (pattern, Some(range)),
            _ => (s, None),
        };

        if pattern.is_empty() {
            return Err(ChatsweepError::invalid_format(
                "user rule",
                format!("'{s}' has an empty name pattern"),
            ));
        }

        let mut rule = UserFilterRule::new(pattern);
        if let Some((from, to)) = range.and_then(|r| r.split_once("..")) {
            if !from.trim().is_empty() {
                rule = rule.with_date_from(from.trim())?;
            }
            if !to.trim().is_empty() {
                rule = rule.with_date_to(to.trim())?;
            }
        }
        Ok(rule)
    }
}

/// Everything that decides which messages a fetch returns.
///
/// Filters are combined with AND logic; the user rules among themselves
/// use OR logic.
///
/// # Examples
///
/// ```
/// use chatsweep::core::filter::FetchSpec;
///
/// # fn main() -> chatsweep::Result<()> {
/// let spec = FetchSpec::new()
///     .with_date_from("2024-01-01")?
///     .with_date_to("2024-12-31")?
///     .with_keyword("release")
///     .with_include_bots(false)
///     .with_limit(500);
///
/// assert!(spec.has_date_filter());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSpec {
    /// Include only messages on or after this timestamp.
    pub date_from: Option<DateTime<Utc>>,

    /// Include only messages on or before this timestamp.
    pub date_to: Option<DateTime<Utc>>,

    /// Author rules; empty means every author passes.
    pub user_rules: Vec<UserFilterRule>,

    /// Case-insensitive substring the content must contain.
    pub keyword: Option<String>,

    /// Whether bot-authored messages are kept.
    pub include_bots: bool,

    /// Fetch the pinned set instead of the full history.
    pub pinned_only: bool,

    /// Maximum number of messages to return.
    pub limit: Option<usize>,
}

impl Default for FetchSpec {
    fn default() -> Self {
        Self {
            date_from: None,
            date_to: None,
            user_rules: Vec::new(),
            keyword: None,
            include_bots: true,
            pinned_only: false,
            limit: None,
        }
    }
}

impl FetchSpec {
    /// Creates a spec that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start date filter (inclusive, start of day).
    ///
    /// # Errors
    ///
    /// Returns [`ChatsweepError::InvalidDate`] if the format is invalid.
    pub fn with_date_from(mut self, date_str: &str) -> Result<Self> {
        self.date_from = Some(parse_date_start(date_str)?);
        Ok(self)
    }

    /// Sets the end date filter (inclusive, end of day).
    ///
    /// # Errors
    ///
    /// Returns [`ChatsweepError::InvalidDate`] if the format is invalid.
    pub fn with_date_to(mut self, date_str: &str) -> Result<Self> {
        self.date_to = Some(parse_date_end(date_str)?);
        Ok(self)
    }

    /// Sets the start timestamp directly.
    #[must_use]
    pub fn with_after(mut self, dt: DateTime<Utc>) -> Self {
        self.date_from = Some(dt);
        self
    }

    /// Sets the end timestamp directly.
    #[must_use]
    pub fn with_before(mut self, dt: DateTime<Utc>) -> Self {
        self.date_to = Some(dt);
        self
    }

    #[must_use]
    pub fn with_user_rule(mut self, rule: UserFilterRule) -> Self {
        self.user_rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_user_rules(mut self, rules: impl IntoIterator<Item = UserFilterRule>) -> Self {
        self.user_rules.extend(rules);
        self
    }

    /// Sets the keyword filter. An empty keyword disables it.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        self.keyword = (!keyword.is_empty()).then_some(keyword);
        self
    }

    #[must_use]
    pub fn with_include_bots(mut self, include_bots: bool) -> Self {
        self.include_bots = include_bots;
        self
    }

    #[must_use]
    pub fn with_pinned_only(mut self, pinned_only: bool) -> Self {
        self.pinned_only = pinned_only;
        self
    }

    /// Caps the result size. A limit of zero means no limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Returns `true` if date filters are active.
    pub fn has_date_filter(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }

    /// Returns `true` if any filter is active.
    pub fn is_active(&self) -> bool {
        self.has_date_filter()
            || !self.user_rules.is_empty()
            || self.keyword.is_some()
            || !self.include_bots
    }

    /// Returns `true` if the message lies within the global date bounds.
    pub fn within_bounds(&self, msg: &Message) -> bool {
        let ts = msg.created_at();
        !(self.date_from.is_some_and(|from| ts < from) || self.date_to.is_some_and(|to| ts > to))
    }

    /// Returns `true` once `accepted` messages satisfy the limit.
    pub fn limit_reached(&self, accepted: usize) -> bool {
        self.limit.is_some_and(|limit| accepted >= limit)
    }
}

/// Evaluates the bot, user-rule and keyword filters against one message.
///
/// Global date bounds are not checked here; paging enforces them (see
/// [`FetchSpec::within_bounds`]).
pub fn accepts(msg: &Message, spec: &FetchSpec) -> bool {
    if !spec.include_bots && msg.author().is_bot() {
        return false;
    }

    if !spec.user_rules.is_empty()
        && !spec
            .user_rules
            .iter()
            .any(|rule| rule.matches(msg, spec.date_from, spec.date_to))
    {
        return false;
    }

    if let Some(keyword) = spec.keyword.as_deref() {
        if !msg.content().to_lowercase().contains(&keyword.to_lowercase()) {
            return false;
        }
    }

    true
}

/// Filters a collection of messages against the bounds and [`accepts`].
///
/// Returns the original messages unchanged when no filter is active.
///
/// ```
/// use chatsweep::core::filter::{FetchSpec, apply_filters};
/// use chatsweep::{Author, Message, Snowflake};
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let messages = vec![
///     Message::new(Snowflake(1), Author::new("Alice"), "deploy done", now),
///     Message::new(Snowflake(2), Author::new("Bob"), "lunch?", now),
/// ];
///
/// let filtered = apply_filters(messages, &FetchSpec::new().with_keyword("DEPLOY"));
/// assert_eq!(filtered.len(), 1);
/// ```
pub fn apply_filters(messages: Vec<Message>, spec: &FetchSpec) -> Vec<Message> {
    if !spec.is_active() {
        return messages;
    }

    messages
        .into_iter()
        .filter(|msg| spec.within_bounds(msg) && accepts(msg, spec))
        .collect()
}

/// Parses `YYYY-MM-DD` (start of day) or RFC 3339.
pub fn parse_date_start(date_str: &str) -> Result<DateTime<Utc>> {
    parse_date(date_str, false)
}

/// Parses `YYYY-MM-DD` (last millisecond of the day) or RFC 3339.
pub fn parse_date_end(date_str: &str) -> Result<DateTime<Utc>> {
    parse_date(date_str, true)
}

fn parse_date(date_str: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let date_str = date_str.trim();
    if let Ok(naive) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        let start = naive.and_time(chrono::NaiveTime::MIN).and_utc();
        return Ok(if end_of_day {
            start + Duration::days(1) - Duration::milliseconds(1)
        } else {
            start
        });
    }
    DateTime::parse_from_rfc3339(date_str)
        .map(|dt| dt.to_utc())
        .map_err(|_| ChatsweepError::invalid_date(date_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Author, Snowflake};
    use chrono::TimeZone;

    fn make_msg(author: &str, content: &str, day: (i32, u32, u32)) -> Message {
        let ts = Utc.with_ymd_and_hms(day.0, day.1, day.2, 12, 0, 0).unwrap();
        Message::new(Snowflake::from_datetime(ts), Author::new(author), content, ts)
    }

    #[test]
    fn test_empty_spec_accepts_everything() {
        let msg = make_msg("Alice", "hi", (2024, 1, 1));
        assert!(accepts(&msg, &FetchSpec::new()));
        assert!(!FetchSpec::new().is_active());
    }

    #[test]
    fn test_bot_exclusion() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let msg = Message::new(Snowflake(1), Author::new("hook").with_bot(true), "x", ts);

        assert!(accepts(&msg, &FetchSpec::new()));
        assert!(!accepts(&msg, &FetchSpec::new().with_include_bots(false)));
    }

    #[test]
    fn test_user_rules_or_logic() {
        let spec = FetchSpec::new()
            .with_user_rule(UserFilterRule::new("alice"))
            .with_user_rule(UserFilterRule::new("bob"));

        assert!(accepts(&make_msg("Alice", "x", (2024, 1, 1)), &spec));
        assert!(accepts(&make_msg("bobby", "x", (2024, 1, 1)), &spec));
        assert!(!accepts(&make_msg("carol", "x", (2024, 1, 1)), &spec));
    }

    #[test]
    fn test_rule_matches_username() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let author = Author::new("Display").with_username("handle_42");
        let msg = Message::new(Snowflake(1), author, "x", ts);
        let spec = FetchSpec::new().with_user_rule(UserFilterRule::new("HANDLE"));
        assert!(accepts(&msg, &spec));
    }

    #[test]
    fn test_per_rule_date_override() {
        let spec = FetchSpec::new()
            .with_user_rule(UserFilterRule::new("alice"))
            .with_user_rule("bob@2024-06-01..".parse().unwrap());

        assert!(!accepts(&make_msg("bob999", "x", (2024, 5, 1)), &spec));
        assert!(accepts(&make_msg("bob999", "x", (2024, 6, 2)), &spec));
        assert!(accepts(&make_msg("alice", "x", (2024, 5, 1)), &spec));
    }

    #[test]
    fn test_rule_falls_back_to_global_bound() {
        let spec = FetchSpec::new()
            .with_date_to("2024-03-01")
            .unwrap()
            .with_user_rule("bob@2024-01-01..".parse().unwrap());

        // rule sets from only; global to still applies
        assert!(!accepts(&make_msg("bob", "x", (2024, 4, 1)), &spec));
        assert!(accepts(&make_msg("bob", "x", (2024, 2, 1)), &spec));
    }

    #[test]
    fn test_keyword_case_insensitive() {
        let spec = FetchSpec::new().with_keyword("Deploy");
        assert!(accepts(&make_msg("a", "the DEPLOY failed", (2024, 1, 1)), &spec));
        assert!(!accepts(&make_msg("a", "all good", (2024, 1, 1)), &spec));
    }

    #[test]
    fn test_empty_keyword_is_none() {
        assert!(FetchSpec::new().with_keyword("").keyword.is_none());
    }

    #[test]
    fn test_within_bounds_inclusive() {
        let spec = FetchSpec::new()
            .with_date_from("2024-01-01")
            .unwrap()
            .with_date_to("2024-01-31")
            .unwrap();

        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let at = |ts| Message::new(Snowflake(1), Author::new("a"), "", ts);
        assert!(spec.within_bounds(&at(first)));
        assert!(spec.within_bounds(&at(last)));
        assert!(!spec.within_bounds(&at(after)));
    }

    #[test]
    fn test_apply_filters_combined() {
        let messages = vec![
            make_msg("Alice", "Old Alice", (2024, 1, 1)),
            make_msg("Alice", "New Alice", (2024, 6, 15)),
            make_msg("Bob", "New Bob", (2024, 6, 15)),
        ];

        let spec = FetchSpec::new()
            .with_date_from("2024-06-01")
            .unwrap()
            .with_user_rule(UserFilterRule::new("alice"));

        let filtered = apply_filters(messages, &spec);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].content(), "New Alice");
    }

    #[test]
    fn test_rule_parsing() {
        let plain: UserFilterRule = "alice".parse().unwrap();
        assert_eq!(plain, UserFilterRule::new("alice"));

        let upper: UserFilterRule = "bob@..2024-02-01".parse().unwrap();
        assert!(upper.date_from.is_none());
        assert_eq!(
            upper.date_to,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 23, 59, 59).unwrap() + Duration::milliseconds(999))
        );

        // an '@' without a range is part of the pattern
        let at: UserFilterRule = "me@home".parse().unwrap();
        assert_eq!(at.name_pattern, "me@home");
    }

    #[test]
    fn test_rule_parsing_errors() {
        assert!("@2024-01-01..".parse::<UserFilterRule>().is_err());
        let err = "bob@01-01-2024..".parse::<UserFilterRule>().unwrap_err();
        assert!(err.is_invalid_date());
    }

    #[test]
    fn test_rule_label() {
        let rule: UserFilterRule = "bob@2024-06-01..2024-06-30".parse().unwrap();
        assert_eq!(rule.label(), "\"bob\" from 2024-06-01 to 2024-06-30");
        assert_eq!(UserFilterRule::new("amy").to_string(), "\"amy\"");
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            parse_date_start("2024-01-15").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date_start("2024-01-15T08:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap()
        );
        assert!(parse_date_start("15/01/2024").unwrap_err().is_invalid_date());
    }

    #[test]
    fn test_limit() {
        assert!(FetchSpec::new().with_limit(0).limit.is_none());
        let spec = FetchSpec::new().with_limit(2);
        assert!(!spec.limit_reached(1));
        assert!(spec.limit_reached(2));
        assert!(!FetchSpec::new().limit_reached(10_000));
    }
}
