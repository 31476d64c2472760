use super::{PageInfo, PageRequest, clamp_page_size};
use crate::{
    cursor::{Cursor, Direction},
    error::Result,
    store::{ContentStore, FeedQuery, Seek},
    telemetry,
    types::ContentItem,
};
use std::sync::Arc;

/// One page of raw (not yet hydrated) content rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Strictly descending by `(createdAt, id)`.
    pub items: Vec<ContentItem>,
    pub info: PageInfo,
}

/// Computes pages over a [`ContentStore`] in either cursor or offset mode.
#[derive(Debug)]
pub struct Paginator<S> {
    store: Arc<S>,
}

impl<S> Clone for Paginator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ContentStore> Paginator<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Serves `request` in whichever mode it selected.
    pub async fn page(&self, query: &FeedQuery, request: &PageRequest) -> Result<Page> {
        let page = match request {
            PageRequest::Cursor { cursor, limit } => {
                self.page_cursor(query, cursor.as_ref(), *limit).await?
            }
            PageRequest::Offset { page, per_page } => {
                self.page_offset(query, *page, *per_page).await?
            }
        };
        telemetry::record_page_served();
        Ok(page)
    }

    /// Cursor mode.
    ///
    /// Fetches `limit + 1` rows past the cursor position; the extra row only
    /// proves that another page exists and is never returned. No count query
    /// is issued.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn page_cursor(
        &self,
        query: &FeedQuery,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Page> {
        let limit = clamp_page_size(limit);
        let seek = cursor.map(|cursor| Seek {
            position: cursor.position(),
            direction: cursor.direction,
        });

        let mut rows = self.store.scan(query, seek, limit + 1).await?;
        let more = rows.len() > limit;
        rows.truncate(limit);

        if rows.is_empty() {
            return Ok(Page::default());
        }

        let (has_next, has_previous) = match cursor.map(|cursor| cursor.direction) {
            None => (more, false),
            Some(Direction::Forward) => (more, true),
            Some(Direction::Backward) => {
                // Scanned ascending from the cursor; restore display order.
                rows.reverse();
                (true, more)
            }
        };

        let info = PageInfo {
            has_next,
            has_previous,
            next_cursor: has_next
                .then(|| rows.last().map(Cursor::forward_from))
                .flatten(),
            previous_cursor: has_previous
                .then(|| rows.first().map(Cursor::backward_from))
                .flatten(),
            ..PageInfo::default()
        };
        Ok(Page { items: rows, info })
    }

    /// Offset mode.
    ///
    /// Issues the slice and count queries concurrently. A page past the end
    /// yields an empty slice with `hasNext = false`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn page_offset(
        &self,
        query: &FeedQuery,
        page: usize,
        per_page: usize,
    ) -> Result<Page> {
        let page = page.max(1);
        let per_page = clamp_page_size(per_page);
        let offset = (page - 1).saturating_mul(per_page);

        let (rows, total) = tokio::try_join!(
            self.store.scan_offset(query, offset, per_page),
            self.store.count(query),
        )?;

        let seen = u64::try_from(offset.saturating_add(rows.len())).unwrap_or(u64::MAX);
        let info = PageInfo {
            has_next: seen < total,
            has_previous: page > 1,
            total: Some(total),
            page: Some(page),
            per_page: Some(per_page),
            ..PageInfo::default()
        };
        Ok(Page { items: rows, info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::MemoryStore,
        types::{ContentId, UserId},
    };
    use chrono::{TimeZone, Utc};

    fn store_with(n: u64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for i in 1..=n {
            let at = Utc.timestamp_micros(1_000 * i as i64).unwrap();
            store.insert_at(UserId(1), format!("post {i}"), at);
        }
        store
    }

    fn ids(page: &Page) -> Vec<u64> {
        page.items.iter().map(|item| item.id.0).collect()
    }

    #[tokio::test]
    async fn first_page_has_no_previous() {
        let paginator = Paginator::new(store_with(5));
        let page = paginator
            .page_cursor(&FeedQuery::Global, None, 2)
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![5, 4]);
        assert!(page.info.has_next);
        assert!(!page.info.has_previous);
        assert!(page.info.previous_cursor.is_none());
        assert_eq!(
            page.info.next_cursor.unwrap().position(),
            page.items[1].position()
        );
    }

    #[tokio::test]
    async fn backward_cursor_returns_newer_items_in_display_order() {
        let paginator = Paginator::new(store_with(6));
        let first = paginator
            .page_cursor(&FeedQuery::Global, None, 2)
            .await
            .unwrap();
        let second = paginator
            .page_cursor(&FeedQuery::Global, first.info.next_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(ids(&second), vec![4, 3]);
        assert!(second.info.has_previous);

        let back = paginator
            .page_cursor(&FeedQuery::Global, second.info.previous_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(ids(&back), vec![6, 5]);
        assert!(back.info.has_next);
        assert!(!back.info.has_previous);
        assert!(back.info.previous_cursor.is_none());
    }

    #[tokio::test]
    async fn empty_collection_mints_no_cursors() {
        let paginator = Paginator::new(store_with(0));
        let page = paginator
            .page_cursor(&FeedQuery::Global, None, 10)
            .await
            .unwrap();
        assert_eq!(page, Page::default());

        let past_end = Cursor::new(0, ContentId(0), Direction::Forward);
        let page = paginator
            .page_cursor(&FeedQuery::Global, Some(&past_end), 10)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.info.has_next && !page.info.has_previous);
    }

    #[tokio::test]
    async fn offset_page_past_the_end_is_empty_not_an_error() {
        let paginator = Paginator::new(store_with(5));
        let page = paginator
            .page_offset(&FeedQuery::Global, 9, 10)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.info.has_next);
        assert!(page.info.has_previous);
        assert_eq!(page.info.total, Some(5));
        assert!(page.info.next_cursor.is_none());
    }

    #[tokio::test]
    async fn offset_page_zero_is_treated_as_the_first() {
        let paginator = Paginator::new(store_with(3));
        let page = paginator
            .page(&FeedQuery::Global, &PageRequest::Offset { page: 0, per_page: 2 })
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![3, 2]);
        assert_eq!(page.info.page, Some(1));
        assert!(page.info.has_next);
        assert!(!page.info.has_previous);
    }
}
