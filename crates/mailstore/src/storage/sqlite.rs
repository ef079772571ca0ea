//! SQLite-backed namespaced message store

use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};

use super::bucket::{Bucket, migrations};
use super::key::MessageKey;
use super::traits::{NamespacedStore, validate_namespace};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageId};
use crate::search::{SearchKind, SearchResults, SearchWindow};

/// SQLite message store
///
/// Each namespace is a [`Bucket`]. Writes run in one `IMMEDIATE` transaction
/// and reads in one deferred transaction, so a read sees a single snapshot
/// and a write touching a namespace and the mirror is all-or-nothing.
///
/// All operations share one connection behind a `Mutex`, so readers are
/// serialized with each other as well as with writers. Separate stores
/// opened on the same file do read concurrently under WAL.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
    bucket: String,
}

impl SqliteMessageStore {
    /// Open or create a store at `path` with default settings
    pub fn new(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open(&StoreConfig::new(path))
    }

    /// Open or create a store
    ///
    /// Waits up to `open_timeout` for other writers to release the database
    /// before failing with `StoreUnavailable`, then ensures the mirror
    /// bucket exists.
    pub fn open(store_config: &StoreConfig) -> Result<Self> {
        validate_namespace(&store_config.bucket)?;

        let path = &store_config.path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path).map_err(|e| {
            StoreError::unavailable(format!("failed to open database at {:?}: {}", path, e))
        })?;

        // The busy timeout has to be in place before anything takes a lock.
        conn.busy_timeout(store_config.open_timeout())?;

        // WAL lets readers proceed while a write transaction is open.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations().to_latest(&mut conn)?;

        let last_id = {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let last_id = Bucket::create_if_missing(&tx, &store_config.bucket)?.sequence()?;
            tx.commit()?;
            last_id
        };

        info!(
            "[STORE] Opened {:?} (mirror namespace {:?}, last id {})",
            path, store_config.bucket, last_id
        );

        Ok(Self {
            conn: Mutex::new(conn),
            bucket: store_config.bucket.clone(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }

    fn try_count(&self, namespace: &str) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = Bucket::open(&tx, namespace)?.len()?;
        Ok(count)
    }
}

impl NamespacedStore for SqliteMessageStore {
    fn default_namespace(&self) -> &str {
        &self.bucket
    }

    fn store_with_namespace(&self, namespace: &str, message: &mut Message) -> Result<MessageId> {
        validate_namespace(namespace)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Only the mirror's sequence issues IDs, so the mirrored copy can never collide.
        let mirror = Bucket::create_if_missing(&tx, &self.bucket)?;
        let sequence = mirror.next_sequence()?;
        let key = MessageKey::from_sequence(sequence);

        message.id = MessageId::from_sequence(sequence);
        let data = serde_json::to_vec(message)?;

        if namespace != self.bucket {
            Bucket::create_if_missing(&tx, namespace)?.put(&key, &data)?;
        }
        mirror.put(&key, &data)?;

        tx.commit()?;

        debug!("[STORE] Stored message {} in {}", message.id, namespace);
        Ok(message.id.clone())
    }

    fn list_with_namespace(
        &self,
        namespace: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let bucket = Bucket::open(&tx, namespace)?;

        let mut messages = Vec::new();
        if limit == 0 {
            return Ok(messages);
        }

        let mut skipped = 0;
        bucket.for_each_rev(|_, data| {
            if skipped < start {
                skipped += 1;
                return Ok(ControlFlow::Continue(()));
            }

            messages.push(serde_json::from_slice(data)?);

            Ok(if messages.len() >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })?;

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
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let bucket = Bucket::open(&tx, namespace)?;

        let mut window = SearchWindow::new(kind, query, start, limit);
        bucket.for_each_rev(|_, data| {
            window.offer(serde_json::from_slice(data)?);
            Ok(ControlFlow::Continue(()))
        })?;

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

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let bucket = Bucket::open(&tx, namespace)?;
        let removed = bucket.delete(&key)?;

        if namespace != self.bucket {
            Bucket::open(&tx, &self.bucket)?.delete(&key)?;
        }

        tx.commit()?;

        debug!(
            "[STORE] Deleted message {} from {} (present: {})",
            id, namespace, removed
        );
        Ok(())
    }

    fn delete_all_with_namespace(&self, namespace: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let bucket = Bucket::open(&tx, namespace)?;

        let pruned = if namespace != self.bucket {
            Bucket::open(&tx, &self.bucket)?.delete_keys_of(&bucket)?
        } else {
            0
        };
        let removed = bucket.recreate()?;

        tx.commit()?;

        debug!(
            "[STORE] Cleared {} ({} messages, {} pruned from {})",
            namespace, removed, pruned, self.bucket
        );
        Ok(())
    }

    fn load_with_namespace(&self, namespace: &str, id: &MessageId) -> Result<Message> {
        let key = MessageKey::from_sequence(id.sequence()?);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        match Bucket::open(&tx, namespace)?.get(&key)? {
            Some(data) if !data.is_empty() => Ok(serde_json::from_slice(&data)?),
            _ => Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                id: id.to_string(),
            }),
        }
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Bucket::names(&tx)
    }
}
