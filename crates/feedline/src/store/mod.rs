//! Storage collaborators consumed by the feed core.
//!
//! The core never talks to a database directly. It is generic over these
//! traits so the relational store, the follower graph and the push system
//! can be swapped (or faked in tests) without touching the engine.
//!
//! All methods return `impl Future + Send` so implementations are free to use
//! any async client, and so the futures can be driven from worker tasks.
//!
//! - [`ContentStore`] - ordered, filtered scans over content rows.
//! - [`ContentWriter`] - durable content creation.
//! - [`MetadataStore`] - grouped aggregate queries, one per metadata type.
//! - [`FollowerProvider`] - follower-list snapshots at publish time.
//! - [`FeedSink`] - idempotent `(follower, content)` feed inserts.
//! - [`Notifier`] - hand-off to the external push-notification system.

mod memory;

pub use memory::*;

use crate::{
    Direction,
    error::StoreError,
    fanout::PushNotification,
    types::{ContentId, ContentItem, Position, UserId},
};
use std::collections::{HashMap, HashSet};

/// An already-filtered, unordered query descriptor. The pagination engine
/// adds the ordering and the continuation predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedQuery {
    /// Every content item.
    Global,
    /// Items authored by one user.
    ByOwner(UserId),
    /// One follower's fanned-out home feed.
    Timeline(UserId),
}

/// Strict row-value predicate applied by a scan.
///
/// - `Forward`: `(createdAt, id) < position`, scanned descending.
/// - `Backward`: `(createdAt, id) > position`, scanned ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seek {
    pub position: Position,
    pub direction: Direction,
}

pub trait ContentStore: Send + Sync {
    /// Returns at most `limit` rows matching `query` in scan order.
    ///
    /// Without a seek the scan starts at the newest row and runs descending.
    fn scan(
        &self,
        query: &FeedQuery,
        seek: Option<Seek>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ContentItem>, StoreError>> + Send;

    /// `ORDER BY createdAt DESC, id DESC OFFSET offset LIMIT limit`.
    fn scan_offset(
        &self,
        query: &FeedQuery,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ContentItem>, StoreError>> + Send;

    /// Number of rows matching `query`.
    fn count(&self, query: &FeedQuery) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

pub trait ContentWriter: Send + Sync {
    /// Durably commits a new item and returns it with its allocated id and
    /// microsecond-precision `createdAt`.
    fn insert_content(
        &self,
        author: UserId,
        body: String,
    ) -> impl Future<Output = Result<ContentItem, StoreError>> + Send;
}

pub trait MetadataStore: Send + Sync {
    /// `SELECT content_id, COUNT(*) FROM likes WHERE content_id IN (..) GROUP BY content_id`.
    ///
    /// Ids without likes may be omitted from the result.
    fn like_counts(
        &self,
        ids: &[ContentId],
    ) -> impl Future<Output = Result<HashMap<ContentId, u64>, StoreError>> + Send;

    /// Grouped comment counts; ids without comments may be omitted.
    fn comment_counts(
        &self,
        ids: &[ContentId],
    ) -> impl Future<Output = Result<HashMap<ContentId, u64>, StoreError>> + Send;

    /// The subset of `ids` that `viewer` has liked.
    fn liked_by(
        &self,
        viewer: UserId,
        ids: &[ContentId],
    ) -> impl Future<Output = Result<HashSet<ContentId>, StoreError>> + Send;
}

pub trait FollowerProvider: Send + Sync {
    /// Complete, de-duplicated follower list of `author` at call time.
    fn followers_of(
        &self,
        author: UserId,
    ) -> impl Future<Output = Result<Vec<UserId>, StoreError>> + Send;
}

pub trait FeedSink: Send + Sync + 'static {
    /// Inserts `content` into `follower`'s feed.
    ///
    /// Must be idempotent on the `(follower, content)` pair: a repeated
    /// insert returns `Ok(false)` and leaves exactly one entry.
    fn insert_feed_entry(
        &self,
        follower: UserId,
        content: ContentId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

pub trait Notifier: Send + Sync + 'static {
    /// Submits a push payload. Delivery is the external system's concern.
    fn notify(
        &self,
        notification: &PushNotification,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
