use crate::{
    error::Result,
    hydrate::Hydrator,
    pagination::{PageRequest, Paginator},
    store::{ContentStore, FeedQuery, MetadataStore},
    types::{FeedPage, UserId},
};
use std::sync::Arc;

/// The read path: one page query plus a constant number of metadata
/// queries, all within the caller's task.
#[derive(Debug)]
pub struct FeedReader<S> {
    paginator: Paginator<S>,
    hydrator: Hydrator<S>,
}

impl<S> Clone for FeedReader<S> {
    fn clone(&self) -> Self {
        Self {
            paginator: self.paginator.clone(),
            hydrator: self.hydrator.clone(),
        }
    }
}

impl<S: ContentStore + MetadataStore> FeedReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            paginator: Paginator::new(Arc::clone(&store)),
            hydrator: Hydrator::new(store),
        }
    }

    /// Serves one hydrated page of `query` for `viewer`.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`](crate::Error::Store) if the page query fails.
    /// - [`Error::MetadataHydration`](crate::Error::MetadataHydration) if any
    ///   metadata query fails; the page is never served with partial counts.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn read(
        &self,
        query: &FeedQuery,
        request: PageRequest,
        viewer: Option<UserId>,
    ) -> Result<FeedPage> {
        let page = self.paginator.page(query, &request).await?;
        self.hydrator.hydrate_page(page, viewer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn page_query_plus_fixed_metadata_queries() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..30 {
            let post = store.insert_now(UserId(1), format!("post {i}"));
            store.like(UserId(2), post.id).unwrap();
        }
        let reader = FeedReader::new(Arc::clone(&store));

        let page = reader
            .read(&FeedQuery::Global, PageRequest::first(25), Some(UserId(2)))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 25);
        assert!(page.items.iter().all(|item| item.metadata.viewer_has_liked));
        assert_eq!(store.stats().content_queries(), 1);
        assert_eq!(store.stats().metadata_queries(), 3);
    }
}
