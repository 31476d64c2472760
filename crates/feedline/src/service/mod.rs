//! Composition roots of the feed core.
//!
//! - [`FeedReader`] - pagination, then hydration, then the response envelope.
//! - [`FeedWriter`] - durable insert, follower snapshot, non-blocking
//!   fan-out.

mod read;
mod write;

pub use read::*;
pub use write::*;
