//! Mailstore - persistence for mail captured by an SMTP sink
//!
//! This crate provides:
//! - The captured message model (SMTP envelope plus parsed paths)
//! - Storage traits with a namespace-aware and a single-namespace form
//! - A durable SQLite backend and an in-memory backend
//! - Linear sender/recipient/body search with offset/limit windowing
//!
//! Messages stored under any namespace are mirrored into the store's
//! default namespace, under the same ID, in the same transaction.

pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod storage;

pub use config::{DEFAULT_BUCKET, StoreConfig};
pub use error::{Result, StoreError};
pub use models::{Message, MessageBuilder, MessageId, Path, SmtpEnvelope};
pub use search::{SearchKind, SearchResults, SearchWindow};
pub use storage::{
    InMemoryMessageStore, MessageKey, MessageStore, NamespacedStore, SqliteMessageStore,
};
