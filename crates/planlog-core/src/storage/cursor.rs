//! Resumable ordered cursor over an integer-keyed blob table
//!
//! A cursor remembers the key it is positioned at rather than holding a
//! live statement, so it can step in either direction and survive rows
//! being deleted underneath it. Every step runs against the connection or
//! transaction the cursor was opened on.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{Error, Result};

/// Decodes a stored blob into a value
pub type Decoder<V> = fn(&[u8]) -> Result<V>;

/// Bidirectional cursor over `(id, value)` pairs in key order
pub struct Cursor<'t, V> {
    conn: &'t Connection,
    table: &'static str,
    decode: Decoder<V>,
    start_key: Option<u64>,
    position: Option<u64>,
}

/// Convert an id to the table's key column type
pub(crate) fn key_of(id: u64) -> Result<i64> {
    match i64::try_from(id) {
        Ok(key) if key > 0 => Ok(key),
        _ => Err(Error::InvalidPlanId(id)),
    }
}

fn read_row(row: &Row) -> rusqlite::Result<(u64, Vec<u8>)> {
    let key: i64 = row.get(0)?;
    Ok((key as u64, row.get(1)?))
}

impl<'t, V> Cursor<'t, V> {
    /// Open a cursor; `first()` seeks to `start_key` (or the next key after
    /// it) when one is given, otherwise to the lowest key
    pub fn open(
        conn: &'t Connection,
        table: &'static str,
        decode: Decoder<V>,
        start_key: Option<u64>,
    ) -> Self {
        Self {
            conn,
            table,
            decode,
            start_key,
            position: None,
        }
    }

    /// Key the cursor is positioned at
    pub fn current(&self) -> Option<u64> {
        self.position
    }

    pub fn first(&mut self) -> Result<Option<(u64, V)>> {
        match self.start_key {
            Some(start) => self.seek("WHERE id >= ?1", "ASC", Some(start)),
            None => self.seek("", "ASC", None),
        }
    }

    pub fn next(&mut self) -> Result<Option<(u64, V)>> {
        match self.position {
            Some(key) => self.seek("WHERE id > ?1", "ASC", Some(key)),
            None => self.first(),
        }
    }

    pub fn prev(&mut self) -> Result<Option<(u64, V)>> {
        match self.position {
            Some(key) => self.seek("WHERE id < ?1", "DESC", Some(key)),
            None => self.last(),
        }
    }

    pub fn last(&mut self) -> Result<Option<(u64, V)>> {
        self.seek("", "DESC", None)
    }

    /// Remove the record at the current position
    ///
    /// The position is kept, so `next()`/`prev()` continue from the gap.
    /// Returns whether a record was actually removed.
    pub fn delete_at_cursor(&mut self) -> Result<bool> {
        let Some(key) = self.position else {
            return Ok(false);
        };
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.table);
        let changed = self.conn.prepare_cached(&sql)?.execute([key_of(key)?])?;
        Ok(changed > 0)
    }

    /// Release the cursor
    pub fn close(self) {}

    fn seek(&mut self, filter: &str, order: &str, bound: Option<u64>) -> Result<Option<(u64, V)>> {
        let sql = format!(
            "SELECT id, data FROM {} {} ORDER BY id {} LIMIT 1",
            self.table, filter, order
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let row = match bound {
            // Only a start key can lie past the key range, and nothing is >= it
            Some(key) => match i64::try_from(key) {
                Ok(key) => stmt.query_row([key], read_row).optional()?,
                Err(_) => None,
            },
            None => stmt.query_row([], read_row).optional()?,
        };

        match row {
            Some((id, bytes)) => {
                let value = (self.decode)(&bytes)?;
                self.position = Some(id);
                Ok(Some((id, value)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    fn decode_text(bytes: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn seeded_db(ids: &[i64]) -> Database {
        let db = Database::open_in_memory().expect("Failed to open database");
        for id in ids {
            db.conn()
                .execute(
                    "INSERT INTO plans (id, data) VALUES (?1, ?2)",
                    rusqlite::params![id, format!("v{}", id).into_bytes()],
                )
                .expect("Failed to insert");
        }
        db
    }

    #[test]
    fn test_forward_traversal() {
        let db = seeded_db(&[3, 1, 7]);
        let mut cursor = Cursor::open(db.conn(), "plans", decode_text, None);

        assert_eq!(cursor.first().unwrap(), Some((1, "v1".to_string())));
        assert_eq!(cursor.next().unwrap(), Some((3, "v3".to_string())));
        assert_eq!(cursor.next().unwrap(), Some((7, "v7".to_string())));
        assert_eq!(cursor.next().unwrap(), None);
        assert_eq!(cursor.current(), Some(7));
    }

    #[test]
    fn test_backward_traversal() {
        let db = seeded_db(&[2, 4, 6]);
        let mut cursor = Cursor::open(db.conn(), "plans", decode_text, None);

        assert_eq!(cursor.last().unwrap().map(|(id, _)| id), Some(6));
        assert_eq!(cursor.prev().unwrap().map(|(id, _)| id), Some(4));
        assert_eq!(cursor.prev().unwrap().map(|(id, _)| id), Some(2));
        assert_eq!(cursor.prev().unwrap(), None);
    }

    #[test]
    fn test_first_seeks_to_start_key_or_next() {
        let db = seeded_db(&[10, 20, 30]);

        let mut exact = Cursor::open(db.conn(), "plans", decode_text, Some(20));
        assert_eq!(exact.first().unwrap().map(|(id, _)| id), Some(20));

        let mut between = Cursor::open(db.conn(), "plans", decode_text, Some(21));
        assert_eq!(between.first().unwrap().map(|(id, _)| id), Some(30));

        let mut past = Cursor::open(db.conn(), "plans", decode_text, Some(31));
        assert_eq!(past.first().unwrap(), None);

        let mut huge = Cursor::open(db.conn(), "plans", decode_text, Some(u64::MAX));
        assert_eq!(huge.first().unwrap(), None);
    }

    #[test]
    fn test_unpositioned_steps() {
        let db = seeded_db(&[5, 6]);

        let mut forward = Cursor::open(db.conn(), "plans", decode_text, None);
        assert_eq!(forward.next().unwrap().map(|(id, _)| id), Some(5));

        let mut backward = Cursor::open(db.conn(), "plans", decode_text, None);
        assert_eq!(backward.prev().unwrap().map(|(id, _)| id), Some(6));
    }

    #[test]
    fn test_delete_at_cursor_keeps_position() {
        let db = seeded_db(&[1, 2, 3]);
        let mut cursor = Cursor::open(db.conn(), "plans", decode_text, None);

        assert!(!cursor.delete_at_cursor().unwrap(), "Unpositioned delete is a no-op");

        cursor.first().unwrap();
        cursor.next().unwrap();
        assert!(cursor.delete_at_cursor().unwrap());
        assert!(!cursor.delete_at_cursor().unwrap(), "Second delete finds nothing");
        assert_eq!(cursor.next().unwrap().map(|(id, _)| id), Some(3));
        assert_eq!(cursor.prev().unwrap().map(|(id, _)| id), Some(1));
        cursor.close();

        let remaining: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 2);
    }

    #[test]
    fn test_empty_table() {
        let db = seeded_db(&[]);
        let mut cursor = Cursor::open(db.conn(), "plans", decode_text, None);
        assert_eq!(cursor.first().unwrap(), None);
        assert_eq!(cursor.last().unwrap(), None);
        assert_eq!(cursor.current(), None);
    }

    #[test]
    fn test_key_of_rejects_zero_and_overflow() {
        assert!(key_of(0).is_err());
        assert!(key_of(u64::MAX).is_err());
        assert_eq!(key_of(9).unwrap(), 9);
    }
}
