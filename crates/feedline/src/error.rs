//! Error types for the feed core.
//!
//! [`Error`] is the single error surfaced by the read and write paths. It
//! mirrors the failure taxonomy of the system:
//!
//! - `InvalidCursor`: a continuation token failed to decode. The client must
//!   restart pagination from the first page.
//! - `AmbiguousPaginationMode`: the request mixed cursor and offset
//!   parameters.
//! - `InvalidRequest`: any other malformed client input.
//! - `MetadataHydration`: one of the batched aggregate queries failed, so the
//!   whole page is failed rather than served with misleading counts.
//! - `Store`: the underlying store failed a pagination or write query.
//! - `InvalidConfig`: a dispatcher was built with unusable settings.
//!
//! Fan-out failures never appear here. They are reported through logs and
//! [`crate::JobReport`]s only.

use crate::cursor::CursorError;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the feed read and write paths.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The continuation token could not be decoded.
    #[error("Invalid cursor ({0}); restart pagination from the first page")]
    InvalidCursor(#[from] CursorError),

    /// Both `cursor` and `page` were supplied.
    #[error("Ambiguous pagination mode: supply either `cursor` or `page`, not both")]
    AmbiguousPaginationMode,

    /// The request was malformed.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A batched metadata query failed; no partial metadata is returned.
    #[error("Metadata hydration failed: {source}")]
    MetadataHydration {
        #[source]
        source: StoreError,
    },

    /// A pagination or write query failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A dispatcher was configured with unusable values.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Returns `true` if retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::MetadataHydration { source } | Self::Store(source) => source.is_transient(),
            Self::InvalidCursor(_)
            | Self::AmbiguousPaginationMode
            | Self::InvalidRequest { .. }
            | Self::InvalidConfig { .. } => false,
        }
    }
}

/// Failures reported by the storage collaborators.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, pool exhausted).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer in time.
    #[error("store operation timed out")]
    Timeout,

    /// A constraint unrelated to idempotent de-duplication was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Transient failures are worth retrying; everything else is terminal.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_follows_store_error() {
        assert!(StoreError::Timeout.is_transient());
        assert!(StoreError::Unavailable("pool".into()).is_transient());
        assert!(!StoreError::Constraint("fk".into()).is_transient());
        assert!(!StoreError::NotFound("post 1".into()).is_transient());

        let err = Error::MetadataHydration {
            source: StoreError::Timeout,
        };
        assert!(err.is_transient());
        assert!(!Error::AmbiguousPaginationMode.is_transient());
        assert!(!Error::InvalidCursor(CursorError::Empty).is_transient());
    }
}
