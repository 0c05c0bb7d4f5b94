//! Pagination state for newest-first and oldest-first walks.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parsing::discord::record_id;
use crate::snowflake::Snowflake;

/// Why a fetch stopped paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The result reached the requested limit.
    Limit,
    /// A record outside the date window was seen in the walk's direction.
    DateBoundary,
    /// The server ran out of records.
    Exhausted,
    /// Only the pinned set was requested; there is no paging.
    PinnedSet,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Limit => "limit reached",
            StopReason::DateBoundary => "date boundary",
            StopReason::Exhausted => "history exhausted",
            StopReason::PinnedSet => "pinned set",
        })
    }
}

/// Where the next page is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAnchor {
    /// Records strictly older than the id, or the newest records when unset.
    Before(Option<Snowflake>),
    /// Records strictly newer than the id.
    After(Snowflake),
}

/// Tracks the position of a paging walk.
///
/// A newest-first walk only ever moves towards older ids, an oldest-first
/// walk only towards newer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    anchor: PageAnchor,
    page_size: u8,
}

impl PaginationCursor {
    /// Starts at the newest record.
    pub fn new(page_size: u8) -> Self {
        Self {
            anchor: PageAnchor::Before(None),
            page_size: page_size.max(1),
        }
    }

    /// Starts just after `date_to`, so records stamped in its final
    /// millisecond are still returned.
    pub fn seeded(page_size: u8, date_to: Option<DateTime<Utc>>) -> Self {
        let before = date_to.map(|to| Snowflake::from_datetime(to + Duration::milliseconds(1)));
        Self {
            anchor: PageAnchor::Before(before),
            ..Self::new(page_size)
        }
    }

    /// Starts an oldest-first walk just before `date_from`, or at the very
    /// first record of the channel.
    pub fn forward(page_size: u8, date_from: Option<DateTime<Utc>>) -> Self {
        let after = date_from.map_or(Snowflake(0), |from| {
            Snowflake(Snowflake::from_datetime(from).get().saturating_sub(1))
        });
        Self {
            anchor: PageAnchor::After(after),
            ..Self::new(page_size)
        }
    }

    pub fn anchor(&self) -> PageAnchor {
        self.anchor
    }

    /// The `before` position of a newest-first walk.
    pub fn before(&self) -> Option<Snowflake> {
        match self.anchor {
            PageAnchor::Before(before) => before,
            PageAnchor::After(_) => None,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.anchor, PageAnchor::After(_))
    }

    pub fn page_size(&self) -> u8 {
        self.page_size
    }

    /// Consumes a page and moves past it: to its oldest id when walking
    /// backwards, to its newest id when walking forwards.
    ///
    /// Returns [`StopReason::Exhausted`] when the page is short or carries no
    /// readable id. A page that does not move the position in the walk's
    /// direction is also treated as exhausted, so a misbehaving server cannot
    /// make the walk loop forever.
    pub fn advance(&mut self, page: &[Value]) -> Result<Snowflake, StopReason> {
        if page.len() < usize::from(self.page_size) {
            return Err(StopReason::Exhausted);
        }
        let ids = page.iter().filter_map(record_id);
        match self.anchor {
            PageAnchor::Before(before) => {
                let oldest = ids.min().ok_or(StopReason::Exhausted)?;
                if before.is_some_and(|before| oldest >= before) {
                    return Err(StopReason::Exhausted);
                }
                self.anchor = PageAnchor::Before(Some(oldest));
                Ok(oldest)
            }
            PageAnchor::After(after) => {
                let newest = ids.max().ok_or(StopReason::Exhausted)?;
                if newest <= after {
                    return Err(StopReason::Exhausted);
                }
                self.anchor = PageAnchor::After(newest);
                Ok(newest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn page(ids: &[u64]) -> Vec<Value> {
        ids.iter().map(|id| json!({ "id": id.to_string() })).collect()
    }

    #[test]
    fn test_unseeded_starts_at_newest() {
        assert!(PaginationCursor::new(100).before().is_none());
        assert!(PaginationCursor::seeded(100, None).before().is_none());
    }

    #[test]
    fn test_seed_is_one_ms_after_date_to() {
        let to = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let cursor = PaginationCursor::seeded(100, Some(to));
        let seed = cursor.before().unwrap();

        // a record created exactly at `to` is strictly older than the seed
        assert!(Snowflake::from_datetime(to) < seed);
        assert_eq!(seed, Snowflake::from_datetime(to + Duration::milliseconds(1)));
    }

    #[test]
    fn test_advance_moves_to_min_id() {
        let mut cursor = PaginationCursor::new(3);
        assert_eq!(cursor.advance(&page(&[30, 10, 20])), Ok(Snowflake(10)));
        assert_eq!(cursor.before(), Some(Snowflake(10)));
    }

    #[test]
    fn test_short_page_exhausts() {
        let mut cursor = PaginationCursor::new(3);
        assert_eq!(cursor.advance(&page(&[30, 20])), Err(StopReason::Exhausted));
        assert_eq!(cursor.advance(&[]), Err(StopReason::Exhausted));
    }

    #[test]
    fn test_page_without_ids_exhausts() {
        let mut cursor = PaginationCursor::new(2);
        let bad = vec![json!({ "id": "x" }), json!({})];
        assert_eq!(cursor.advance(&bad), Err(StopReason::Exhausted));
    }

    #[test]
    fn test_cursor_never_moves_forward() {
        let mut cursor = PaginationCursor::new(2);
        cursor.advance(&page(&[20, 10])).unwrap();
        assert_eq!(cursor.advance(&page(&[30, 15])), Err(StopReason::Exhausted));
        assert_eq!(cursor.before(), Some(Snowflake(10)));
    }

    #[test]
    fn test_numeric_ids() {
        let mut cursor = PaginationCursor::new(2);
        let numeric = vec![json!({ "id": 7 }), json!({ "id": 5 })];
        assert_eq!(cursor.advance(&numeric), Ok(Snowflake(5)));
    }

    #[test]
    fn test_forward_seed_is_just_before_date_from() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cursor = PaginationCursor::forward(100, Some(from));
        let PageAnchor::After(after) = cursor.anchor() else {
            panic!("expected an oldest-first walk");
        };

        // a record created exactly at `from` is strictly newer than the seed
        assert!(after < Snowflake::from_datetime(from));
        assert!(cursor.is_forward());
        assert!(cursor.before().is_none());
        assert_eq!(PaginationCursor::forward(100, None).anchor(), PageAnchor::After(Snowflake(0)));
    }

    #[test]
    fn test_forward_advance_moves_to_max_id() {
        let mut cursor = PaginationCursor::forward(3, None);
        assert_eq!(cursor.advance(&page(&[30, 10, 20])), Ok(Snowflake(30)));
        assert_eq!(cursor.anchor(), PageAnchor::After(Snowflake(30)));
        assert_eq!(cursor.advance(&page(&[25, 31, 40])), Ok(Snowflake(40)));
    }

    #[test]
    fn test_forward_cursor_never_moves_back() {
        let mut cursor = PaginationCursor::forward(2, None);
        cursor.advance(&page(&[20, 10])).unwrap();
        assert_eq!(cursor.advance(&page(&[15, 5])), Err(StopReason::Exhausted));
        assert_eq!(cursor.advance(&page(&[9])), Err(StopReason::Exhausted));
        assert_eq!(cursor.anchor(), PageAnchor::After(Snowflake(20)));
    }
}
