//! In-memory storage implementation
//!
//! Keeps the same serialized records and sequence rules as the SQLite store,
//! without a file. Used for testing and for short-lived capture sessions.

use std::collections::BTreeMap;
use std::sync::RwLock;

use log::{debug, warn};

use super::key::MessageKey;
use super::traits::{NamespacedStore, validate_namespace};
use crate::config::DEFAULT_BUCKET;
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageId};
use crate::search::{SearchKind, SearchResults, SearchWindow};

/// One namespace: ordered records plus a sequence counter
#[derive(Default)]
struct Bucket {
    /// Last issued ID; only the mirror's counter ever advances
    sequence: u64,
    entries: BTreeMap<MessageKey, Vec<u8>>,
}

/// In-memory implementation of NamespacedStore
///
/// All namespaces sit behind a single RwLock, so reads run concurrently and
/// each write is applied atomically.
pub struct InMemoryMessageStore {
    bucket: String,
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl InMemoryMessageStore {
    /// Create an empty store mirroring into `"default"`
    pub fn new() -> Self {
        Self::with_mirror(DEFAULT_BUCKET.to_string())
    }

    /// Create an empty store with a custom mirror namespace
    ///
    /// Fails with `InvalidNamespace` if `bucket` is empty.
    pub fn with_bucket(bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        validate_namespace(&bucket)?;
        Ok(Self::with_mirror(bucket))
    }

    fn with_mirror(bucket: String) -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(bucket.clone(), Bucket::default());

        Self {
            bucket,
            buckets: RwLock::new(buckets),
        }
    }

    fn try_count(&self, namespace: &str) -> Result<usize> {
        let buckets = self.buckets.read()?;
        let bucket = buckets
            .get(namespace)
            .ok_or_else(|| StoreError::namespace_missing(namespace))?;
        Ok(bucket.entries.len())
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespacedStore for InMemoryMessageStore {
    fn default_namespace(&self) -> &str {
        &self.bucket
    }

    fn store_with_namespace(&self, namespace: &str, message: &mut Message) -> Result<MessageId> {
        validate_namespace(namespace)?;

        let mut buckets = self.buckets.write()?;

        let mirror = buckets.entry(self.bucket.clone()).or_default();
        let sequence = mirror.sequence + 1;
        let key = MessageKey::from_sequence(sequence);

        message.id = MessageId::from_sequence(sequence);
        let data = serde_json::to_vec(message)?;

        // Nothing is mutated until serialization has succeeded.
        mirror.sequence = sequence;
        mirror.entries.insert(key, data.clone());

        if namespace != self.bucket {
            buckets
                .entry(namespace.to_string())
                .or_default()
                .entries
                .insert(key, data);
        }

        debug!("[STORE] Stored message {} in {} (memory)", message.id, namespace);
        Ok(message.id.clone())
    }

    fn list_with_namespace(
        &self,
        namespace: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let buckets = self.buckets.read()?;
        let bucket = buckets
            .get(namespace)
            .ok_or_else(|| StoreError::namespace_missing(namespace))?;

        // skip/take are lazy, so records outside the window are never decoded
        let messages = bucket
            .entries
            .values()
            .rev()
            .skip(start)
            .take(limit)
            .map(|data| serde_json::from_slice(data).map_err(StoreError::from))
            .collect::<Result<Vec<Message>>>()?;

        Ok(messages)
    }

    fn search_with_namespace(
        &self,
        namespace: &str,
        kind: SearchKind,
        query: &str,
        start: usize,
        limit: usize,
    ) -> Result<SearchResults> {
        let buckets = self.buckets.read()?;
        let bucket = buckets
            .get(namespace)
            .ok_or_else(|| StoreError::namespace_missing(namespace))?;

        let mut window = SearchWindow::new(kind, query, start, limit);
        for data in bucket.entries.values().rev() {
            window.offer(serde_json::from_slice(data)?);
        }

        Ok(window.finish())
    }

    fn count_with_namespace(&self, namespace: &str) -> usize {
        match self.try_count(namespace) {
            Ok(count) => count,
            Err(e) => {
                warn!("[STORE] Failed to count messages in {}: {}", namespace, e);
                0
            }
        }
    }

    fn delete_one_with_namespace(&self, namespace: &str, id: &MessageId) -> Result<()> {
        let key = MessageKey::from_sequence(id.sequence()?);

        let mut buckets = self.buckets.write()?;
        if !buckets.contains_key(namespace) {
            return Err(StoreError::namespace_missing(namespace));
        }

        for name in [namespace, self.bucket.as_str()] {
            if let Some(bucket) = buckets.get_mut(name) {
                bucket.entries.remove(&key);
            }
        }

        debug!("[STORE] Deleted message {} from {} (memory)", id, namespace);
        Ok(())
    }

    fn delete_all_with_namespace(&self, namespace: &str) -> Result<()> {
        let mut buckets = self.buckets.write()?;

        let bucket = buckets
            .get_mut(namespace)
            .ok_or_else(|| StoreError::namespace_missing(namespace))?;
        let removed = std::mem::take(&mut bucket.entries);

        if namespace != self.bucket
            && let Some(mirror) = buckets.get_mut(&self.bucket)
        {
            for key in removed.keys() {
                mirror.entries.remove(key);
            }
        }

        debug!(
            "[STORE] Cleared {} ({} messages, memory)",
            namespace,
            removed.len()
        );
        Ok(())
    }

    fn load_with_namespace(&self, namespace: &str, id: &MessageId) -> Result<Message> {
        let key = MessageKey::from_sequence(id.sequence()?);

        let buckets = self.buckets.read()?;
        let bucket = buckets
            .get(namespace)
            .ok_or_else(|| StoreError::namespace_missing(namespace))?;

        match bucket.entries.get(&key) {
            Some(data) if !data.is_empty() => Ok(serde_json::from_slice(data)?),
            _ => Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                id: id.to_string(),
            }),
        }
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        let buckets = self.buckets.read()?;
        Ok(buckets.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MessageStore;

    fn make_test_message(from: &str, to: &str) -> Message {
        Message::builder()
            .from(from)
            .to([to])
            .data(format!("From: {}\r\nTo: {}\r\n\r\nhello", from, to))
            .build()
    }

    #[test]
    fn test_new_store_has_mirror() {
        let store = InMemoryMessageStore::new();
        assert_eq!(store.list_namespaces().unwrap(), vec!["default"]);
        assert_eq!(store.count(), 0);
        assert!(store.list(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_store_and_load() {
        let store = InMemoryMessageStore::new();
        let mut message = make_test_message("a@x.com", "b@x.com");

        let id = store.store(&mut message).unwrap();
        assert_eq!(id.as_str(), "1");
        assert_eq!(store.load(&id).unwrap(), message);
    }

    #[test]
    fn test_namespace_ids_follow_the_mirror() {
        let store = InMemoryMessageStore::new();

        let a = store.store(&mut make_test_message("a@x.com", "b@x.com")).unwrap();
        let b = store
            .store_with_namespace("suite", &mut make_test_message("c@x.com", "d@x.com"))
            .unwrap();
        let c = store.store(&mut make_test_message("e@x.com", "f@x.com")).unwrap();

        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("1", "2", "3"));
        assert_eq!(store.count(), 3);
        assert_eq!(store.count_with_namespace("suite"), 1);
    }

    #[test]
    fn test_custom_mirror_bucket() {
        let store = InMemoryMessageStore::with_bucket("captured").unwrap();
        let id = store.store(&mut make_test_message("a@x.com", "b@x.com")).unwrap();

        assert_eq!(store.default_namespace(), "captured");
        assert!(store.load_with_namespace("captured", &id).is_ok());
        assert_eq!(store.list_namespaces().unwrap(), vec!["captured"]);
    }

    #[test]
    fn test_empty_mirror_bucket_rejected() {
        let err = InMemoryMessageStore::with_bucket("").err().unwrap();
        assert!(matches!(err, StoreError::InvalidNamespace { .. }));
    }

    #[test]
    fn test_only_mirror_sequence_advances() {
        let store = InMemoryMessageStore::new();
        store
            .store_with_namespace("suite", &mut make_test_message("a@x.com", "b@x.com"))
            .unwrap();

        let buckets = store.buckets.read().unwrap();
        assert_eq!(buckets["default"].sequence, 1);
        assert_eq!(buckets["suite"].sequence, 0);
    }

    #[test]
    fn test_delete_one_in_namespace_removes_mirror_copy() {
        let store = InMemoryMessageStore::new();
        let id = store
            .store_with_namespace("suite", &mut make_test_message("a@x.com", "b@x.com"))
            .unwrap();

        store.delete_one_with_namespace("suite", &id).unwrap();
        assert!(store.load(&id).unwrap_err().is_not_found());
        assert!(store.load_with_namespace("suite", &id).unwrap_err().is_not_found());

        // deleting again is a no-op
        store.delete_one_with_namespace("suite", &id).unwrap();
    }

    #[test]
    fn test_delete_all_in_mirror_keeps_namespaces() {
        let store = InMemoryMessageStore::new();
        let id = store
            .store_with_namespace("suite", &mut make_test_message("a@x.com", "b@x.com"))
            .unwrap();

        store.delete_all().unwrap();
        assert_eq!(store.count(), 0);
        assert!(store.load_with_namespace("suite", &id).is_ok());
    }

    #[test]
    fn test_poisoned_lock_is_unavailable() {
        let store = std::sync::Arc::new(InMemoryMessageStore::new());

        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.buckets.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err = store.list(0, 10).unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable { .. }));
        assert_eq!(store.count(), 0);
    }
}
