//! # Core feed types
//!
//! - [`ContentId`] / [`UserId`] - strongly typed row identifiers.
//! - [`ContentItem`] - the unit being paginated (a post, a notification).
//! - [`Position`] - the `(createdAt, id)` pair that totally orders items.
//! - [`AggregateMetadata`] - derived counts and viewer flags for one item.
//! - [`FeedItem`] / [`FeedPage`] - the response envelope served to clients.
//!
//! Items are always ordered by `(createdAt, id)` descending. `createdAt`
//! alone is not unique (several posts can land in the same microsecond), so
//! the id breaks ties and makes the order total. The sort key used in
//! cursors and store predicates is `createdAt` in whole microseconds since
//! the Unix epoch; writers truncate timestamps to that precision so the key
//! and the stored value never disagree.

use crate::pagination::PageInfo;
use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Identifier of a content item. Allocated monotonically by the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u64);

/// Identifier of a user (author, follower or viewer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ContentId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<u64> for UserId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Sort position of an item: `(createdAt micros, id)`.
///
/// The derived `Ord` compares `sort_key` first and `id` second, which is
/// exactly the row-value comparison `(createdAt, id) < (a, b)` used by cursor
/// predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub sort_key: i64,
    pub id: ContentId,
}

impl Position {
    pub const fn new(sort_key: i64, id: ContentId) -> Self {
        Self { sort_key, id }
    }
}

/// A post as stored. Immutable once committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: ContentId,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

impl ContentItem {
    /// The `(createdAt, id)` position of this item.
    pub fn position(&self) -> Position {
        Position::new(self.created_at.timestamp_micros(), self.id)
    }
}

/// Derived per-item data, computed fresh on every read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetadata {
    pub like_count: u64,
    pub comment_count: u64,
    /// Always `false` for anonymous viewers.
    pub viewer_has_liked: bool,
}

/// One element of the response envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    #[serde(flatten)]
    pub metadata: AggregateMetadata,
}

/// The response envelope returned by both pagination modes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub page_info: PageInfo,
}
