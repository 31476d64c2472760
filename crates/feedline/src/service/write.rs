use crate::{
    error::{Error, Result},
    fanout::Dispatcher,
    store::{ContentWriter, FollowerProvider},
    types::{ContentItem, UserId},
};
use std::sync::Arc;

/// The write path.
///
/// Only the durable insert can fail a publish. Follower lookup and fan-out
/// happen after the commit and are best-effort: their failures are logged,
/// and the caller gets the created item either way.
#[derive(Debug)]
pub struct FeedWriter<S> {
    store: Arc<S>,
    dispatcher: Arc<Dispatcher>,
}

impl<S> Clone for FeedWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<S: ContentWriter + FollowerProvider> FeedWriter<S> {
    pub const fn new(store: Arc<S>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Commits a new item by `author` and schedules its fan-out.
    ///
    /// Returns as soon as the fan-out batches are queued; it never waits for
    /// feed inserts or notifications.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `body` is blank.
    /// - [`Error::Store`] if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, body), fields(len = body.len()))]
    pub async fn publish(&self, author: UserId, body: String) -> Result<ContentItem> {
        if body.trim().is_empty() {
            return Err(Error::InvalidRequest {
                reason: "body must not be empty".into(),
            });
        }

        let item = self.store.insert_content(author, body).await?;

        match self.store.followers_of(author).await {
            Ok(followers) => {
                let receipt = self.dispatcher.dispatch(item.id, author, &followers);
                tracing::debug!(
                    content_id = %item.id,
                    followers = followers.len(),
                    jobs = receipt.jobs_enqueued,
                    shed = receipt.batches_shed,
                    "Published content"
                );
            }
            Err(e) => tracing::warn!(
                content_id = %item.id,
                author_id = %author,
                error = %e,
                "Follower lookup failed; content published without fan-out"
            ),
        }

        Ok(item)
    }
}
