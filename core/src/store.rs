//! SQLite record store — the relational collaborator holding raw rows.
//!
//! RULE: Only store.rs talks to the database.
//! The engine reads rows back as strings and parses them like any
//! other source, so a database import and a CSV file behave the same.

use crate::{
    error::PotentialResult,
    record::{RawRow, RAW_ROW_WIDTH},
};
use rusqlite::{params, params_from_iter, types::ValueRef, Connection, OpenFlags};

/// Positional columns of `data_table`, in raw-row order.
const DATA_COLUMNS: [&str; RAW_ROW_WIDTH] = [
    "id_lvl_1",
    "id_lvl_2",
    "parameter_id",
    "fact_amt",
    "fact_amt_2",
    "field_1_value_s",
    "field_3_value_s",
    "field_4_value_s",
    "field_5_value_s",
    "field_6_value_s",
    "field_7_value_s",
    "field_8_value_s",
    "field_9_value_s",
    "field_10_value_s",
    "field_11_value_n",
    "field_12_value_n",
    "field_13_value_d",
    "load_id",
    "load_date",
    "field_2_value_s",
    "date_act",
];

pub struct RecordStore {
    conn: Connection,
    location: String,
}

impl RecordStore {
    pub fn open(path: &str) -> PotentialResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn,
            location: path.to_string(),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PotentialResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            location: ":memory:".to_string(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PotentialResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_records.sql"))?;
        Ok(())
    }

    // ── data_table ─────────────────────────────────────────────

    /// Insert rows in one transaction. Short rows are padded, extra
    /// fields beyond the positional width are ignored.
    pub fn insert_raw_rows(&self, rows: &[RawRow], import_timestamp: &str) -> PotentialResult<usize> {
        let columns = DATA_COLUMNS.join(", ");
        let placeholders = (1..=RAW_ROW_WIDTH + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "INSERT INTO data_table ({columns}, import_timestamp) VALUES ({placeholders})"
        );

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let values = (0..RAW_ROW_WIDTH)
                    .map(|i| row.field(i))
                    .chain(std::iter::once(import_timestamp));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// All rows in insertion order. Non-text cells (from databases
    /// filled by other tools) are rendered back to text.
    pub fn raw_rows(&self) -> PotentialResult<Vec<RawRow>> {
        let sql = format!(
            "SELECT {} FROM data_table ORDER BY id ASC",
            DATA_COLUMNS.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |r| {
                let mut fields = Vec::with_capacity(RAW_ROW_WIDTH);
                for i in 0..RAW_ROW_WIDTH {
                    fields.push(cell_text(r.get_ref(i)?));
                }
                Ok(RawRow::new(fields))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn record_count(&self) -> PotentialResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM data_table", [], |r| r.get(0))?)
    }

    /// Most frequent segment labels with their row counts.
    pub fn segment_counts(&self, limit: usize) -> PotentialResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT field_1_value_s, COUNT(*) AS n
             FROM data_table
             WHERE field_1_value_s IS NOT NULL AND field_1_value_s != ''
             GROUP BY field_1_value_s
             ORDER BY n DESC, field_1_value_s ASC
             LIMIT ?1",
        )?;
        let counts = stmt
            .query_map(params![limit as i64], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

fn cell_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_round_trip_through_data_table() {
        let store = RecordStore::in_memory().unwrap();
        store.migrate().unwrap();
        let rows = vec![
            RawRow::from_iter(["1", "2", "p", "10,5"]),
            RawRow::from_iter(["3"]),
        ];
        assert_eq!(store.insert_raw_rows(&rows, "2026-01-01T00:00:00").unwrap(), 2);
        assert_eq!(store.record_count().unwrap(), 2);

        let back = store.raw_rows().unwrap();
        assert_eq!(back[0].field(3), "10,5");
        assert_eq!(back[1].field(0), "3");
        assert_eq!(back[1].field(20), "");
    }

    #[test]
    fn file_database_runs_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let store = RecordStore::open(&path.display().to_string()).unwrap();
        store.migrate().unwrap();
        let mode: String = store
            .conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn numeric_cells_read_back_as_text() {
        let store = RecordStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
            .conn
            .execute("INSERT INTO data_table (fact_amt) VALUES (?1)", params![12.5f64])
            .unwrap();
        let back = store.raw_rows().unwrap();
        assert_eq!(back[0].field(3), "12.5");
    }
}
