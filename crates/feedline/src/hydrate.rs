//! Batched aggregate metadata.
//!
//! A page of `N` items is hydrated with a fixed number of grouped queries:
//! two for anonymous viewers (likes, comments) and three when a viewer is
//! known (plus the viewer's likes). The count never depends on `N`.

use crate::{
    error::{Error, Result},
    pagination::Page,
    store::MetadataStore,
    types::{AggregateMetadata, ContentId, ContentItem, FeedItem, FeedPage, UserId},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

#[derive(Debug)]
pub struct Hydrator<M> {
    store: Arc<M>,
}

impl<M> Clone for Hydrator<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<M: MetadataStore> Hydrator<M> {
    pub const fn new(store: Arc<M>) -> Self {
        Self { store }
    }

    /// Computes [`AggregateMetadata`] for every item in `items`.
    ///
    /// Items without likes or comments get zero counts. Anonymous viewers
    /// always see `viewer_has_liked = false`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataHydration`] if any batched query fails. No
    /// partial map is returned.
    #[tracing::instrument(level = "debug", skip_all, fields(items = items.len(), viewer = ?viewer))]
    pub async fn hydrate(
        &self,
        items: &[ContentItem],
        viewer: Option<UserId>,
    ) -> Result<HashMap<ContentId, AggregateMetadata>> {
        if items.is_empty() {
            return Ok(HashMap::new());
        }

        let mut ids: Vec<ContentId> = items.iter().map(|item| item.id).collect();
        ids.sort_unstable();
        ids.dedup();

        let liked = async {
            match viewer {
                Some(viewer) => self.store.liked_by(viewer, &ids).await,
                None => Ok(HashSet::new()),
            }
        };
        let (likes, comments, liked) = tokio::try_join!(
            self.store.like_counts(&ids),
            self.store.comment_counts(&ids),
            liked,
        )
        .map_err(|source| Error::MetadataHydration { source })?;

        Ok(ids
            .into_iter()
            .map(|id| {
                let metadata = AggregateMetadata {
                    like_count: likes.get(&id).copied().unwrap_or_default(),
                    comment_count: comments.get(&id).copied().unwrap_or_default(),
                    viewer_has_liked: liked.contains(&id),
                };
                (id, metadata)
            })
            .collect())
    }

    /// Hydrates `page` and wraps it in the response envelope, keeping the
    /// page order.
    pub async fn hydrate_page(&self, page: Page, viewer: Option<UserId>) -> Result<FeedPage> {
        let metadata = self.hydrate(&page.items, viewer).await?;
        let items = page
            .items
            .into_iter()
            .map(|item| FeedItem {
                metadata: metadata.get(&item.id).copied().unwrap_or_default(),
                item,
            })
            .collect();

        Ok(FeedPage {
            items,
            page_info: page.info,
        })
    }
}
