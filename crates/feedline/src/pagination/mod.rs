//! Dual-mode pagination over one ordered collection.
//!
//! - Cursor mode (mobile, infinite scroll): strict `(createdAt, id)`
//!   continuation, `limit + 1` probe for `hasNext`, no count query.
//! - Offset mode (web, page numbers): `OFFSET/LIMIT` plus a count query for
//!   `total`. Cost grows with the page number; deep pagination belongs in
//!   cursor mode.
//!
//! Both modes share the same ordering, so neither can observe an order the
//! other would not.

mod engine;
mod info;
mod request;

pub use engine::*;
pub use info::*;
pub use request::*;
