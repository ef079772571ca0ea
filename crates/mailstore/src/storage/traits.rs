//! Storage trait definitions

use crate::error::{Result, StoreError};
use crate::models::{Message, MessageId};
use crate::search::{SearchKind, SearchResults};

/// Namespace-aware message storage
///
/// Every backend keeps one mirror namespace ([`default_namespace`]) that
/// holds a copy of every message stored under any other namespace. Writes to
/// a namespace and to the mirror happen atomically.
///
/// [`default_namespace`]: NamespacedStore::default_namespace
pub trait NamespacedStore: Send + Sync {
    /// Name of the mirror namespace
    fn default_namespace(&self) -> &str;

    /// Store a message, assigning and returning its ID
    ///
    /// `message.id` is overwritten with the new ID. The namespace is created
    /// if it doesn't exist yet.
    fn store_with_namespace(&self, namespace: &str, message: &mut Message) -> Result<MessageId>;

    /// List messages, most recently stored first, skipping `start` and
    /// returning at most `limit`
    fn list_with_namespace(&self, namespace: &str, start: usize, limit: usize)
    -> Result<Vec<Message>>;

    /// Search messages, most recently stored first
    ///
    /// Matches are ranked from 1; those ranked in `[start, start + limit)`
    /// are returned along with the total number of matches.
    fn search_with_namespace(
        &self,
        namespace: &str,
        kind: SearchKind,
        query: &str,
        start: usize,
        limit: usize,
    ) -> Result<SearchResults>;

    /// Number of stored messages; 0 if the namespace can't be read
    fn count_with_namespace(&self, namespace: &str) -> usize;

    /// Delete one message; deleting an unknown ID succeeds
    fn delete_one_with_namespace(&self, namespace: &str, id: &MessageId) -> Result<()>;

    /// Delete every message in the namespace, keeping the namespace itself
    fn delete_all_with_namespace(&self, namespace: &str) -> Result<()>;

    /// Load a message by ID
    fn load_with_namespace(&self, namespace: &str, id: &MessageId) -> Result<Message>;

    /// Every namespace the store knows about, including the mirror
    fn list_namespaces(&self) -> Result<Vec<String>>;
}

/// Single-namespace message storage
///
/// Implemented for every [`NamespacedStore`] by targeting its mirror namespace.
pub trait MessageStore: Send + Sync {
    fn store(&self, message: &mut Message) -> Result<MessageId>;

    fn list(&self, start: usize, limit: usize) -> Result<Vec<Message>>;

    fn search(
        &self,
        kind: SearchKind,
        query: &str,
        start: usize,
        limit: usize,
    ) -> Result<SearchResults>;

    fn count(&self) -> usize;

    fn delete_one(&self, id: &MessageId) -> Result<()>;

    fn delete_all(&self) -> Result<()>;

    fn load(&self, id: &MessageId) -> Result<Message>;
}

impl<T: NamespacedStore + ?Sized> MessageStore for T {
    fn store(&self, message: &mut Message) -> Result<MessageId> {
        self.store_with_namespace(self.default_namespace(), message)
    }

    fn list(&self, start: usize, limit: usize) -> Result<Vec<Message>> {
        self.list_with_namespace(self.default_namespace(), start, limit)
    }

    fn search(
        &self,
        kind: SearchKind,
        query: &str,
        start: usize,
        limit: usize,
    ) -> Result<SearchResults> {
        self.search_with_namespace(self.default_namespace(), kind, query, start, limit)
    }

    fn count(&self) -> usize {
        self.count_with_namespace(self.default_namespace())
    }

    fn delete_one(&self, id: &MessageId) -> Result<()> {
        self.delete_one_with_namespace(self.default_namespace(), id)
    }

    fn delete_all(&self) -> Result<()> {
        self.delete_all_with_namespace(self.default_namespace())
    }

    fn load(&self, id: &MessageId) -> Result<Message> {
        self.load_with_namespace(self.default_namespace(), id)
    }
}

/// Reject namespace names no backend can store
pub(crate) fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(StoreError::InvalidNamespace {
            namespace: namespace.to_string(),
        });
    }
    Ok(())
}
