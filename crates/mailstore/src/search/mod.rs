//! Linear message search
//!
//! Searches are a reverse scan over a namespace: each record is tested with a
//! [`SearchKind`] predicate and matches are windowed by [`SearchWindow`].

mod kind;
mod window;

pub use kind::SearchKind;
pub use window::{SearchResults, SearchWindow};
