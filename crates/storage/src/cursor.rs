// Path: crates/storage/src/cursor.rs

//! A forward cursor over one table.
//!
//! The cursor re-seeks on every advance instead of pinning a backend range,
//! so it holds no transaction open across calls. Callers must not mutate the
//! underlying table while a cursor is live; the engine's locking discipline
//! guarantees this.

use crate::db::Db;
use crate::tables::Table;
use meridian_types::codec;
use meridian_types::error::StoreError;
use parity_scale_codec::Decode;

/// A forward cursor positioned on at most one entry of a table.
pub struct Cursor<'db> {
    db: &'db Db,
    table: Table,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl<'db> Cursor<'db> {
    /// Positions a new cursor at the first entry with key `>= lower_bound`.
    pub(crate) fn seek(db: &'db Db, table: Table, lower_bound: &[u8]) -> Result<Self, StoreError> {
        let current = db.entry_at_or_after(table, lower_bound)?;
        Ok(Cursor { db, table, current })
    }

    /// Whether the cursor is positioned on an entry.
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// The key of the current entry, if any.
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    /// The raw value of the current entry, if any.
    pub fn raw_value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }

    /// Decodes the value of the current entry, if any.
    pub fn value<V: Decode>(&self) -> Result<Option<V>, StoreError> {
        match &self.current {
            Some((_, bytes)) => codec::from_bytes_canonical(bytes)
                .map(Some)
                .map_err(StoreError::Decode),
            None => Ok(None),
        }
    }

    /// Advances to the next entry in byte order, invalidating at the end.
    pub fn next(&mut self) -> Result<(), StoreError> {
        self.current = match self.current.take() {
            Some((key, _)) => self.db.entry_after(self.table, &key)?,
            None => None,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    #[test]
    fn cursor_walks_in_key_order_from_lower_bound() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path()).unwrap();
        for key in [b"a1", b"a2", b"b1", b"b2"] {
            db.put(tables::ACCOUNT_INDEX, key, &1u64).unwrap();
        }

        let mut cursor = db.lower_bound(tables::ACCOUNT_INDEX, b"a2").unwrap();
        let mut seen = Vec::new();
        while cursor.is_valid() {
            seen.push(cursor.key().unwrap().to_vec());
            assert_eq!(cursor.value::<u64>().unwrap(), Some(1));
            cursor.next().unwrap();
        }
        assert_eq!(seen, vec![b"a2".to_vec(), b"b1".to_vec(), b"b2".to_vec()]);

        let empty = db.lower_bound(tables::ACCOUNT_INDEX, b"c").unwrap();
        assert!(!empty.is_valid());
        assert!(empty.key().is_none());
    }
}
