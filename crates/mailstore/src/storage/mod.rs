//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for captured messages.
//! Callers program against [`NamespacedStore`] / [`MessageStore`], so the
//! SQLite and in-memory backends can be swapped freely.

mod bucket;
mod key;
mod memory;
mod sqlite;
mod traits;

pub use key::MessageKey;
pub use memory::InMemoryMessageStore;
pub use sqlite::SqliteMessageStore;
pub use traits::{MessageStore, NamespacedStore};
