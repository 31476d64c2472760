//! Opaque continuation tokens.
//!
//! A [`Cursor`] is never stored server-side: it is minted from the last (or
//! first) item of a page and replayed by the client. The wire form is a
//! tagged, versioned byte layout rendered as fixed-width Crockford Base32, so
//! a token from an unknown codec version fails closed instead of being
//! misread.

mod codec;
mod crockford;
mod error;

pub use codec::*;
pub use error::*;
