use super::{
    ContentStore, ContentWriter, FeedQuery, FeedSink, FollowerProvider, MetadataStore, Notifier,
    Seek,
};
use crate::{
    cursor::Direction,
    error::StoreError,
    fanout::PushNotification,
    types::{ContentId, ContentItem, Position, UserId},
};
use chrono::{DateTime, Utc};
use core::ops::Bound;
use parking_lot::{Mutex, RwLock};
use portable_atomic::{AtomicU64, Ordering};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Per-kind query counters.
#[derive(Debug, Default)]
pub struct QueryStats {
    content: AtomicU64,
    metadata: AtomicU64,
}

impl QueryStats {
    /// Scans, offset scans and counts issued so far.
    pub fn content_queries(&self) -> u64 {
        self.content.load(Ordering::Relaxed)
    }

    /// Grouped metadata queries issued so far.
    pub fn metadata_queries(&self) -> u64 {
        self.metadata.load(Ordering::Relaxed)
    }

    fn content_query(&self) {
        self.content.fetch_add(1, Ordering::Relaxed);
    }

    fn metadata_query(&self) {
        self.metadata.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Tables {
    posts: HashMap<ContentId, ContentItem>,
    global: BTreeSet<Position>,
    by_owner: HashMap<UserId, BTreeSet<Position>>,
    /// Fanned-out home feeds. Set membership is the `(follower, content)`
    /// uniqueness constraint.
    timelines: HashMap<UserId, BTreeSet<Position>>,
    likes: HashMap<ContentId, HashSet<UserId>>,
    comments: HashMap<ContentId, Vec<(UserId, String)>>,
    followers: HashMap<UserId, BTreeSet<UserId>>,
}

impl Tables {
    fn index(&self, query: &FeedQuery) -> Option<&BTreeSet<Position>> {
        match query {
            FeedQuery::Global => Some(&self.global),
            FeedQuery::ByOwner(owner) => self.by_owner.get(owner),
            FeedQuery::Timeline(follower) => self.timelines.get(follower),
        }
    }

    fn rows<'a>(&'a self, positions: impl Iterator<Item = &'a Position>) -> Vec<ContentItem> {
        positions
            .filter_map(|position| self.posts.get(&position.id))
            .cloned()
            .collect()
    }

    fn require(&self, content: ContentId) -> Result<(), StoreError> {
        if self.posts.contains_key(&content) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("content {content}")))
        }
    }
}

/// An in-process implementation of every storage collaborator.
///
/// Indexes are ordered sets of [`Position`], so scans are range queries in
/// `(createdAt, id)` order exactly like a composite index would serve them.
/// Every content and metadata query bumps [`QueryStats`].
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
    stats: QueryStats,
    metadata_fault: Mutex<Option<StoreError>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
            stats: QueryStats::default(),
            metadata_fault: Mutex::new(None),
        }
    }

    pub const fn stats(&self) -> &QueryStats {
        &self.stats
    }

    /// Makes every metadata query fail with `fault` until cleared with
    /// `None`.
    pub fn fail_metadata(&self, fault: Option<StoreError>) {
        *self.metadata_fault.lock() = fault;
    }

    /// Commits a post stamped with the current time.
    pub fn insert_now(&self, author: UserId, body: String) -> ContentItem {
        self.insert_at(author, body, Utc::now())
    }

    /// Commits a post with an explicit `createdAt`, truncated to
    /// microseconds.
    pub fn insert_at(&self, author: UserId, body: String, created_at: DateTime<Utc>) -> ContentItem {
        let created_at =
            DateTime::from_timestamp_micros(created_at.timestamp_micros()).unwrap_or(created_at);
        let item = ContentItem {
            id: ContentId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            owner_id: author,
            created_at,
            body,
        };
        let position = item.position();

        let mut tables = self.tables.write();
        tables.global.insert(position);
        tables.by_owner.entry(author).or_default().insert(position);
        tables.posts.insert(item.id, item.clone());
        item
    }

    /// Looks up a single post.
    pub fn get(&self, content: ContentId) -> Option<ContentItem> {
        self.tables.read().posts.get(&content).cloned()
    }

    /// Records that `follower` follows `author`. Returns `false` if the edge
    /// already existed.
    pub fn follow(&self, follower: UserId, author: UserId) -> Result<bool, StoreError> {
        if follower == author {
            return Err(StoreError::Constraint("users cannot follow themselves".into()));
        }
        Ok(self
            .tables
            .write()
            .followers
            .entry(author)
            .or_default()
            .insert(follower))
    }

    /// Records a like. Returns `false` if `user` had already liked `content`.
    pub fn like(&self, user: UserId, content: ContentId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        tables.require(content)?;
        Ok(tables.likes.entry(content).or_default().insert(user))
    }

    /// Appends a comment and returns the new comment count of `content`.
    pub fn comment(&self, user: UserId, content: ContentId, body: String) -> Result<u64, StoreError> {
        let mut tables = self.tables.write();
        tables.require(content)?;
        let comments = tables.comments.entry(content).or_default();
        comments.push((user, body));
        Ok(comments.len() as u64)
    }

    fn check_metadata(&self) -> Result<(), StoreError> {
        self.stats.metadata_query();
        match &*self.metadata_fault.lock() {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }
}

impl ContentStore for MemoryStore {
    async fn scan(
        &self,
        query: &FeedQuery,
        seek: Option<Seek>,
        limit: usize,
    ) -> Result<Vec<ContentItem>, StoreError> {
        self.stats.content_query();
        let tables = self.tables.read();
        let Some(index) = tables.index(query) else {
            return Ok(Vec::new());
        };

        let rows = match seek {
            None => tables.rows(index.iter().rev().take(limit)),
            Some(Seek {
                position,
                direction: Direction::Forward,
            }) => tables.rows(index.range(..position).rev().take(limit)),
            Some(Seek {
                position,
                direction: Direction::Backward,
            }) => tables.rows(
                index
                    .range((Bound::Excluded(position), Bound::Unbounded))
                    .take(limit),
            ),
        };
        Ok(rows)
    }

    async fn scan_offset(
        &self,
        query: &FeedQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentItem>, StoreError> {
        self.stats.content_query();
        let tables = self.tables.read();
        Ok(tables
            .index(query)
            .map(|index| tables.rows(index.iter().rev().skip(offset).take(limit)))
            .unwrap_or_default())
    }

    async fn count(&self, query: &FeedQuery) -> Result<u64, StoreError> {
        self.stats.content_query();
        let tables = self.tables.read();
        Ok(tables.index(query).map_or(0, |index| index.len() as u64))
    }
}

impl ContentWriter for MemoryStore {
    async fn insert_content(&self, author: UserId, body: String) -> Result<ContentItem, StoreError> {
        Ok(self.insert_now(author, body))
    }
}

impl MetadataStore for MemoryStore {
    async fn like_counts(&self, ids: &[ContentId]) -> Result<HashMap<ContentId, u64>, StoreError> {
        self.check_metadata()?;
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| {
                let likes = tables.likes.get(id)?;
                Some((*id, likes.len() as u64))
            })
            .collect())
    }

    async fn comment_counts(
        &self,
        ids: &[ContentId],
    ) -> Result<HashMap<ContentId, u64>, StoreError> {
        self.check_metadata()?;
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| {
                let comments = tables.comments.get(id)?;
                Some((*id, comments.len() as u64))
            })
            .collect())
    }

    async fn liked_by(
        &self,
        viewer: UserId,
        ids: &[ContentId],
    ) -> Result<HashSet<ContentId>, StoreError> {
        self.check_metadata()?;
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter(|id| {
                tables
                    .likes
                    .get(*id)
                    .is_some_and(|users| users.contains(&viewer))
            })
            .copied()
            .collect())
    }
}

impl FollowerProvider for MemoryStore {
    async fn followers_of(&self, author: UserId) -> Result<Vec<UserId>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .followers
            .get(&author)
            .map(|followers| followers.iter().copied().collect())
            .unwrap_or_default())
    }
}

impl FeedSink for MemoryStore {
    async fn insert_feed_entry(
        &self,
        follower: UserId,
        content: ContentId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        let position = tables
            .posts
            .get(&content)
            .map(ContentItem::position)
            .ok_or_else(|| {
                StoreError::Constraint(format!("feed entry references unknown content {content}"))
            })?;
        Ok(tables.timelines.entry(follower).or_default().insert(position))
    }
}

/// A [`Notifier`] that records every payload instead of delivering it.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<PushNotification>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything notified so far, in submission order.
    pub fn delivered(&self) -> Vec<PushNotification> {
        self.sent.lock().clone()
    }
}

impl Notifier for MemoryOutbox {
    async fn notify(&self, notification: &PushNotification) -> Result<(), StoreError> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(micros: i64) -> DateTime<Utc> {
        Utc.timestamp_micros(micros).unwrap()
    }

    #[tokio::test]
    async fn scans_honour_the_strict_row_value_predicate() {
        let store = MemoryStore::new();
        // Three posts in the same microsecond: only the id orders them.
        let a = store.insert_at(UserId(1), "a".into(), at(500));
        let b = store.insert_at(UserId(1), "b".into(), at(500));
        let c = store.insert_at(UserId(1), "c".into(), at(500));

        let older = store
            .scan(
                &FeedQuery::Global,
                Some(Seek {
                    position: c.position(),
                    direction: Direction::Forward,
                }),
                10,
            )
            .await
            .unwrap();
        assert_eq!(older, vec![b.clone(), a.clone()]);

        let newer = store
            .scan(
                &FeedQuery::Global,
                Some(Seek {
                    position: a.position(),
                    direction: Direction::Backward,
                }),
                10,
            )
            .await
            .unwrap();
        assert_eq!(newer, vec![b, c]);
    }

    #[tokio::test]
    async fn owner_and_timeline_indexes_are_filtered() {
        let store = MemoryStore::new();
        let mine = store.insert_at(UserId(1), "mine".into(), at(1));
        store.insert_at(UserId(2), "theirs".into(), at(2));

        let rows = store.scan(&FeedQuery::ByOwner(UserId(1)), None, 10).await.unwrap();
        assert_eq!(rows, vec![mine.clone()]);
        assert_eq!(store.count(&FeedQuery::Timeline(UserId(3))).await.unwrap(), 0);

        assert!(store.insert_feed_entry(UserId(3), mine.id).await.unwrap());
        let rows = store.scan(&FeedQuery::Timeline(UserId(3)), None, 10).await.unwrap();
        assert_eq!(rows, vec![mine]);
    }

    #[tokio::test]
    async fn feed_inserts_are_idempotent() {
        let store = MemoryStore::new();
        let post = store.insert_now(UserId(1), "hello".into());

        assert!(store.insert_feed_entry(UserId(9), post.id).await.unwrap());
        assert!(!store.insert_feed_entry(UserId(9), post.id).await.unwrap());
        assert_eq!(store.count(&FeedQuery::Timeline(UserId(9))).await.unwrap(), 1);

        let err = store.insert_feed_entry(UserId(9), ContentId(404)).await;
        assert!(matches!(err, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn follower_snapshot_is_deduplicated() {
        let store = MemoryStore::new();
        assert!(store.follow(UserId(2), UserId(1)).unwrap());
        assert!(!store.follow(UserId(2), UserId(1)).unwrap());
        assert!(store.follow(UserId(3), UserId(1)).unwrap());
        assert!(store.follow(UserId(1), UserId(1)).is_err());

        let followers = store.followers_of(UserId(1)).await.unwrap();
        assert_eq!(followers, vec![UserId(2), UserId(3)]);
    }

    #[test]
    fn timestamps_are_truncated_to_microseconds() {
        let store = MemoryStore::new();
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let item = store.insert_at(UserId(1), "x".into(), precise);
        assert_eq!(item.created_at.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn likes_on_unknown_content_are_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.like(UserId(1), ContentId(1)),
            Err(StoreError::NotFound(_))
        ));
    }
}
