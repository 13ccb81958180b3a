// Path: crates/storage/src/db.rs

//! The database handle and the atomic write batch.

use crate::cursor::Cursor;
use crate::tables::{Table, ALL_TABLES};
use meridian_types::codec;
use meridian_types::error::StoreError;
use parity_scale_codec::{Decode, Encode};
use redb::{Database, ReadableTable};
use std::ops::Bound;
use std::path::Path;

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// A handle to the persistent ordered store.
///
/// All typed maps live as named tables inside one redb file so that a block's
/// writes commit as a single atomic batch.
pub struct Db {
    db: Database,
}

impl Db {
    /// Opens (or creates) the store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("chain.redb");
        let db = Database::create(&path).map_err(backend)?;

        // Materialize the full layout so an empty store is structured on disk.
        let txn = db.begin_write().map_err(backend)?;
        for table in ALL_TABLES {
            txn.open_table(table).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;

        tracing::debug!(path = %path.display(), "opened chain store");
        Ok(Db { db })
    }

    /// Fetches the raw bytes stored under `key`.
    pub fn get_raw(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let t = txn.open_table(table).map_err(backend)?;
        let value = t.get(key).map_err(backend)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    /// Fetches and decodes the value stored under `key`.
    pub fn get<V: Decode>(&self, table: Table, key: &[u8]) -> Result<Option<V>, StoreError> {
        match self.get_raw(table, key)? {
            Some(bytes) => codec::from_bytes_canonical(&bytes)
                .map(Some)
                .map_err(StoreError::Decode),
            None => Ok(None),
        }
    }

    /// Whether `key` is present in `table`.
    pub fn contains(&self, table: Table, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get_raw(table, key)?.is_some())
    }

    /// Stores one encoded value under `key` in its own atomic batch.
    pub fn put<V: Encode>(&self, table: Table, key: &[u8], value: &V) -> Result<(), StoreError> {
        let mut batch = self.begin_batch()?;
        batch.put(table, key, value)?;
        batch.commit()
    }

    /// Removes `key` in its own atomic batch.
    pub fn remove(&self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        let mut batch = self.begin_batch()?;
        batch.remove(table, key)?;
        batch.commit()
    }

    /// The first entry of `table` in byte order.
    pub fn first<V: Decode>(&self, table: Table) -> Result<Option<(Vec<u8>, V)>, StoreError> {
        self.decode_entry(self.entry_at_or_after(table, &[])?)
    }

    /// The last entry of `table` in byte order.
    pub fn last<V: Decode>(&self, table: Table) -> Result<Option<(Vec<u8>, V)>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let t = txn.open_table(table).map_err(backend)?;
        let mut range = t.range::<&[u8]>(..).map_err(backend)?;
        let back = range.next_back().transpose().map_err(backend)?;
        let entry = back.map(|(k, v)| (k.value().to_vec(), v.value().to_vec()));
        self.decode_entry(entry)
    }

    /// Positions a cursor at the first entry whose key is `>= lower_bound`.
    pub fn lower_bound(&self, table: Table, lower_bound: &[u8]) -> Result<Cursor<'_>, StoreError> {
        Cursor::seek(self, table, lower_bound)
    }

    /// Begins an atomic write batch covering any number of tables.
    pub fn begin_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        Ok(WriteBatch {
            txn: self.db.begin_write().map_err(backend)?,
        })
    }

    pub(crate) fn entry_at_or_after(
        &self,
        table: Table,
        bound: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.range_first(table, (Bound::Included(bound), Bound::Unbounded))
    }

    pub(crate) fn entry_after(
        &self,
        table: Table,
        key: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.range_first(table, (Bound::Excluded(key), Bound::Unbounded))
    }

    fn range_first(
        &self,
        table: Table,
        bounds: (Bound<&[u8]>, Bound<&[u8]>),
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let t = txn.open_table(table).map_err(backend)?;
        let mut range = t.range::<&[u8]>(bounds).map_err(backend)?;
        let front = range.next().transpose().map_err(backend)?;
        let entry = front.map(|(k, v)| (k.value().to_vec(), v.value().to_vec()));
        Ok(entry)
    }

    fn decode_entry<V: Decode>(
        &self,
        entry: Option<(Vec<u8>, Vec<u8>)>,
    ) -> Result<Option<(Vec<u8>, V)>, StoreError> {
        match entry {
            Some((key, bytes)) => codec::from_bytes_canonical(&bytes)
                .map(|v| Some((key, v)))
                .map_err(StoreError::Decode),
            None => Ok(None),
        }
    }
}

/// An atomic group of writes. Nothing is visible until [`WriteBatch::commit`];
/// dropping the batch discards every staged write.
pub struct WriteBatch<'db> {
    txn: redb::WriteTransaction<'db>,
}

impl<'db> WriteBatch<'db> {
    /// Stages an encoded value under `key`.
    pub fn put<V: Encode>(&mut self, table: Table, key: &[u8], value: &V) -> Result<(), StoreError> {
        let bytes = codec::to_bytes_canonical(value).map_err(StoreError::Encode)?;
        self.put_raw(table, key, &bytes)
    }

    /// Stages raw bytes under `key`.
    pub fn put_raw(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut t = self.txn.open_table(table).map_err(backend)?;
        t.insert(key, value).map_err(backend)?;
        Ok(())
    }

    /// Stages the removal of `key`.
    pub fn remove(&mut self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        let mut t = self.txn.open_table(table).map_err(backend)?;
        t.remove(key).map_err(backend)?;
        Ok(())
    }

    /// Reads through the batch: staged writes are visible, and a key not yet
    /// touched by the batch reads its committed value.
    pub fn get<V: Decode>(&self, table: Table, key: &[u8]) -> Result<Option<V>, StoreError> {
        let t = self.txn.open_table(table).map_err(backend)?;
        let guard = t.get(key).map_err(backend)?;
        let result = match guard {
            Some(guard) => codec::from_bytes_canonical(guard.value())
                .map(Some)
                .map_err(StoreError::Decode),
            None => Ok(None),
        };
        result
    }

    /// Atomically commits every staged write.
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    fn open_temp() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn put_get_remove_roundtrip() {
        let (_dir, db) = open_temp();
        db.put(tables::PROPERTY, b"k", &42u64).unwrap();
        assert_eq!(db.get::<u64>(tables::PROPERTY, b"k").unwrap(), Some(42));
        assert!(db.contains(tables::PROPERTY, b"k").unwrap());

        db.remove(tables::PROPERTY, b"k").unwrap();
        assert_eq!(db.get::<u64>(tables::PROPERTY, b"k").unwrap(), None);
    }

    #[test]
    fn first_and_last_follow_byte_order() {
        let (_dir, db) = open_temp();
        for (key, value) in [(b"b", 2u64), (b"a", 1u64), (b"c", 3u64)] {
            db.put(tables::ACCOUNT, key, &value).unwrap();
        }
        let (first_key, first): (Vec<u8>, u64) = db.first(tables::ACCOUNT).unwrap().unwrap();
        let (last_key, last): (Vec<u8>, u64) = db.last(tables::ACCOUNT).unwrap().unwrap();
        assert_eq!((first_key.as_slice(), first), (&b"a"[..], 1));
        assert_eq!((last_key.as_slice(), last), (&b"c"[..], 3));
    }

    #[test]
    fn dropped_batch_leaves_no_trace() {
        let (_dir, db) = open_temp();
        {
            let mut batch = db.begin_batch().unwrap();
            batch.put(tables::ASSET, b"x", &7u64).unwrap();
            // dropped without commit
        }
        assert_eq!(db.get::<u64>(tables::ASSET, b"x").unwrap(), None);

        let mut batch = db.begin_batch().unwrap();
        batch.put(tables::ASSET, b"x", &7u64).unwrap();
        batch.put(tables::BALANCE, b"y", &8u64).unwrap();
        batch.commit().unwrap();
        assert_eq!(db.get::<u64>(tables::ASSET, b"x").unwrap(), Some(7));
        assert_eq!(db.get::<u64>(tables::BALANCE, b"y").unwrap(), Some(8));
    }

    #[test]
    fn batch_reads_staged_and_committed_values() {
        let (_dir, db) = open_temp();
        db.put(tables::ACCOUNT, b"committed", &1u64).unwrap();

        let mut batch = db.begin_batch().unwrap();
        assert_eq!(
            batch.get::<u64>(tables::ACCOUNT, b"committed").unwrap(),
            Some(1)
        );
        batch.put(tables::ACCOUNT, b"staged", &2u64).unwrap();
        assert_eq!(batch.get::<u64>(tables::ACCOUNT, b"staged").unwrap(), Some(2));
        batch.commit().unwrap();
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Db::open(dir.path()).unwrap();
            db.put(tables::PROPERTY, b"persist", &9u64).unwrap();
        }
        let db = Db::open(dir.path()).unwrap();
        assert_eq!(db.get::<u64>(tables::PROPERTY, b"persist").unwrap(), Some(9));
    }
}
