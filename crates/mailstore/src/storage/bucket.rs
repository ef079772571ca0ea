//! Bucket primitives over SQLite
//!
//! A bucket is a named, ordered key/value collection with its own durable
//! sequence counter. Buckets live in two tables:
//!
//! - `buckets`: one row per bucket holding the last issued sequence number
//! - `entries`: `(bucket, key) -> value`, keys being 16-byte [`MessageKey`]s
//!
//! Every [`Bucket`] borrows a connection that is expected to be inside a
//! transaction, so any mix of bucket calls commits or rolls back together.

use std::ops::ControlFlow;

use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::key::MessageKey;
use crate::error::{Result, StoreError};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
pub(crate) fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: buckets and their entries
        M::up(
            r#"
            CREATE TABLE buckets (
                name TEXT PRIMARY KEY,
                sequence INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE entries (
                bucket TEXT NOT NULL,
                key BLOB NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (bucket, key),
                FOREIGN KEY (bucket) REFERENCES buckets(name) ON DELETE CASCADE
            ) WITHOUT ROWID;
            "#,
        ),
    ])
}

/// Handle to one bucket inside an open transaction
pub(crate) struct Bucket<'a> {
    conn: &'a Connection,
    name: &'a str,
}

impl<'a> Bucket<'a> {
    /// Open an existing bucket, failing with `NamespaceMissing` if it was never created
    pub fn open(conn: &'a Connection, name: &'a str) -> Result<Self> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?)",
            [name],
            |row| row.get(0),
        )?;

        if !exists {
            return Err(StoreError::namespace_missing(name));
        }

        Ok(Self { conn, name })
    }

    pub fn create_if_missing(conn: &'a Connection, name: &'a str) -> Result<Self> {
        conn.execute("INSERT OR IGNORE INTO buckets (name) VALUES (?)", [name])?;
        Ok(Self { conn, name })
    }

    /// Names of every bucket, sorted
    pub fn names(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Last sequence number issued for this bucket (0 if none)
    pub fn sequence(&self) -> Result<u64> {
        let sequence: i64 = self.conn.query_row(
            "SELECT sequence FROM buckets WHERE name = ?",
            [self.name],
            |row| row.get(0),
        )?;
        to_u64(sequence)
    }

    /// Increment and return the bucket's sequence number
    pub fn next_sequence(&self) -> Result<u64> {
        let sequence: i64 = self.conn.query_row(
            "UPDATE buckets SET sequence = sequence + 1 WHERE name = ? RETURNING sequence",
            [self.name],
            |row| row.get(0),
        )?;
        to_u64(sequence)
    }

    pub fn put(&self, key: &MessageKey, value: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (bucket, key, value) VALUES (?, ?, ?)",
            params![self.name, key.as_bytes(), value],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &MessageKey) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE bucket = ? AND key = ?",
                params![self.name, key.as_bytes()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Remove a key; returns false if it was not present
    pub fn delete(&self, key: &MessageKey) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM entries WHERE bucket = ? AND key = ?",
            params![self.name, key.as_bytes()],
        )?;
        Ok(removed > 0)
    }

    /// Number of keys in the bucket
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE bucket = ?",
            [self.name],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::unavailable("negative entry count"))
    }

    /// Visit entries from the highest key to the lowest
    ///
    /// Rows are stepped lazily; returning `ControlFlow::Break` stops the scan
    /// without reading the remaining rows.
    pub fn for_each_rev<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(MessageKey, &[u8]) -> Result<ControlFlow<()>>,
    {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM entries WHERE bucket = ? ORDER BY key DESC")?;
        let mut rows = stmt.query([self.name])?;

        while let Some(row) = rows.next()? {
            let key = row.get_ref(0)?.as_blob().map_err(StoreError::unavailable)?;
            let value = row.get_ref(1)?.as_blob().map_err(StoreError::unavailable)?;

            if visit(MessageKey::try_from(key)?, value)?.is_break() {
                break;
            }
        }

        Ok(())
    }

    /// Delete from this bucket every key that is also present in `other`
    pub fn delete_keys_of(&self, other: &Bucket<'_>) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM entries
             WHERE bucket = ?1
               AND key IN (SELECT key FROM entries WHERE bucket = ?2)",
            params![self.name, other.name],
        )?;
        Ok(removed)
    }

    /// Drop every entry and leave the bucket empty
    ///
    /// The bucket row survives, and with it the sequence counter, so keys
    /// issued before the reset are never handed out again.
    pub fn recreate(&self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM entries WHERE bucket = ?", [self.name])?;
        Ok(removed)
    }
}

fn to_u64(sequence: i64) -> Result<u64> {
    u64::try_from(sequence)
        .map_err(|_| StoreError::unavailable(format!("corrupt sequence value {}", sequence)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        migrations().to_latest(&mut conn).unwrap();
        conn
    }

    fn keys_rev(bucket: &Bucket<'_>) -> Vec<u64> {
        let mut keys = Vec::new();
        bucket
            .for_each_rev(|key, _| {
                keys.push(key.sequence());
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        keys
    }

    #[test]
    fn test_migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn test_open_missing_bucket() {
        let conn = create_test_conn();
        let err = Bucket::open(&conn, "nope").err().unwrap();
        assert!(matches!(err, StoreError::NamespaceMissing { ref namespace } if namespace == "nope"));
    }

    #[test]
    fn test_create_is_idempotent() {
        let conn = create_test_conn();
        Bucket::create_if_missing(&conn, "default").unwrap();
        let bucket = Bucket::create_if_missing(&conn, "default").unwrap();
        bucket.put(&MessageKey::from_sequence(1), b"x").unwrap();

        // re-creating the row must not clear entries
        let bucket = Bucket::create_if_missing(&conn, "default").unwrap();
        assert_eq!(bucket.len().unwrap(), 1);
        assert_eq!(Bucket::names(&conn).unwrap(), vec!["default"]);
    }

    #[test]
    fn test_sequences_are_per_bucket() {
        let conn = create_test_conn();
        let a = Bucket::create_if_missing(&conn, "a").unwrap();
        let b = Bucket::create_if_missing(&conn, "b").unwrap();

        assert_eq!(a.next_sequence().unwrap(), 1);
        assert_eq!(a.next_sequence().unwrap(), 2);
        assert_eq!(b.next_sequence().unwrap(), 1);
        assert_eq!(a.sequence().unwrap(), 2);
    }

    #[test]
    fn test_put_get_delete() {
        let conn = create_test_conn();
        let bucket = Bucket::create_if_missing(&conn, "a").unwrap();
        let key = MessageKey::from_sequence(5);

        assert_eq!(bucket.get(&key).unwrap(), None);
        bucket.put(&key, b"hello").unwrap();
        assert_eq!(bucket.get(&key).unwrap(), Some(b"hello".to_vec()));

        assert!(bucket.delete(&key).unwrap());
        assert!(!bucket.delete(&key).unwrap());
        assert_eq!(bucket.len().unwrap(), 0);
    }

    #[test]
    fn test_reverse_scan_and_early_stop() {
        let conn = create_test_conn();
        let bucket = Bucket::create_if_missing(&conn, "a").unwrap();
        for seq in [3, 1, 300, 2] {
            bucket.put(&MessageKey::from_sequence(seq), b"v").unwrap();
        }

        assert_eq!(keys_rev(&bucket), vec![300, 3, 2, 1]);

        let mut seen = Vec::new();
        bucket
            .for_each_rev(|key, _| {
                seen.push(key.sequence());
                Ok(if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        assert_eq!(seen, vec![300, 3]);
    }

    #[test]
    fn test_delete_keys_of_and_recreate() {
        let conn = create_test_conn();
        let mirror = Bucket::create_if_missing(&conn, "default").unwrap();
        let inbox = Bucket::create_if_missing(&conn, "inbox").unwrap();

        for seq in 1..=4 {
            mirror.put(&MessageKey::from_sequence(seq), b"v").unwrap();
        }
        for seq in [2, 4] {
            inbox.put(&MessageKey::from_sequence(seq), b"v").unwrap();
        }
        for _ in 0..4 {
            inbox.next_sequence().unwrap();
        }

        assert_eq!(mirror.delete_keys_of(&inbox).unwrap(), 2);
        assert_eq!(keys_rev(&mirror), vec![3, 1]);

        assert_eq!(inbox.recreate().unwrap(), 2);
        assert_eq!(inbox.len().unwrap(), 0);
        assert_eq!(inbox.sequence().unwrap(), 4);
        assert!(Bucket::open(&conn, "inbox").is_ok());
    }
}
