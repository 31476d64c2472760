//! # `feedline`: Feed Delivery Core
//!
//! `feedline` serves chronological feeds and propagates new content to
//! followers. It is the part of a social backend that sits between the HTTP
//! handlers and the database:
//!
//! - **Cursor Codec**: opaque, versioned, URL-safe continuation tokens
//!   encoding a `(createdAt, id)` position.
//! - **Pagination Engine**: one ordering, two modes. Cursor mode for infinite
//!   scroll (stable under concurrent inserts, no count query) and offset mode
//!   for numbered pages (with a total).
//! - **Batch Metadata Hydrator**: like counts, comment counts and the
//!   viewer's own likes for a whole page in a constant number of grouped
//!   queries.
//! - **Fan-out Dispatcher**: a bounded Tokio worker pool that inserts new
//!   content into follower feeds and submits push notifications without
//!   delaying the request that created it.
//!
//! The core is generic over its storage collaborators (see [`store`]), so the
//! same engine runs against a relational store in production and against
//! [`MemoryStore`] in tests.
//!
//! ## Example
//!
//! ```no_run
//! use feedline::{
//!     Dispatcher, DispatcherConfig, FeedQuery, FeedReader, FeedWriter, MemoryOutbox,
//!     MemoryStore, PageRequest, UserId,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> feedline::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::default(),
//!     Arc::clone(&store),
//!     Arc::new(MemoryOutbox::new()),
//! )?;
//! let writer = FeedWriter::new(Arc::clone(&store), Arc::new(dispatcher));
//! let reader = FeedReader::new(Arc::clone(&store));
//!
//! writer.publish(UserId(1), "hello".into()).await?;
//! let page = reader
//!     .read(&FeedQuery::Global, PageRequest::default(), None)
//!     .await?;
//! if let Some(next) = page.page_info.next_cursor {
//!     let _ = reader
//!         .read(&FeedQuery::Global, PageRequest::after(next, 20), None)
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

mod cursor;
mod error;
mod fanout;
mod hydrate;
mod pagination;
mod service;
pub mod store;
pub mod telemetry;
mod types;

pub use crate::cursor::*;
pub use crate::error::*;
pub use crate::fanout::*;
pub use crate::hydrate::*;
pub use crate::pagination::*;
pub use crate::service::*;
pub use crate::store::{
    ContentStore, ContentWriter, FeedQuery, FeedSink, FollowerProvider, MemoryOutbox,
    MemoryStore, MetadataStore, Notifier, QueryStats, Seek,
};
pub use crate::types::*;
