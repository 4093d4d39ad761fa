//! SQLite destination table
//!
//! `Store` only knows where the database lives and which table to append to;
//! every worker opens its own [`RowWriter`] connection from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior, params};

use crate::record::SubhaloRecord;

/// How long a writer waits on a lock held by another worker.
const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

/// Destination table name for a simulation/snapshot pair.
pub fn table_name(simulation: &str, snapshot: u32) -> String {
    format!("SHID_{simulation}_{snapshot}")
}

/// Double-quote an SQL identifier (simulation names contain `-`).
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Append-only subhalo table in a SQLite file.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    table: String,
}

impl Store {
    /// Open (or create) the database and make sure the table exists.
    ///
    /// An existing table is reused as is; rows are only ever appended.
    pub fn create(path: &Path, simulation: &str, snapshot: u32) -> rusqlite::Result<Self> {
        let table = table_name(simulation, snapshot);
        let conn = open(path)?;
        // WAL lets readers proceed while a worker commits
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("{}: journal_mode={mode}", path.display());

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER,
                    sfr REAL,
                    mass_log_msun REAL,
                    url TEXT
                )",
                quote_ident(&table)
            ),
            [],
        )?;
        log::info!("Table {table} ready in {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// New connection for one worker.
    pub fn writer(&self) -> rusqlite::Result<RowWriter> {
        Ok(RowWriter {
            conn: open(&self.path)?,
            insert_sql: format!(
                "INSERT INTO {} (id, sfr, mass_log_msun, url) VALUES (?1, ?2, ?3, ?4)",
                quote_ident(&self.table)
            ),
        })
    }

    pub fn row_count(&self) -> rusqlite::Result<u64> {
        let conn = open(&self.path)?;
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table)),
            [],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    /// All rows, ordered by id (tests and inspection).
    pub fn rows(&self) -> rusqlite::Result<Vec<SubhaloRecord>> {
        let conn = open(&self.path)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, sfr, mass_log_msun, url FROM {} ORDER BY id",
            quote_ident(&self.table)
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(SubhaloRecord {
                id: row.get(0)?,
                sfr: row.get(1)?,
                mass_log_msun: row.get(2)?,
                url: row.get(3)?,
            })
        })?;
        rows.collect()
    }
}

/// One worker's connection; each call to [`insert`](RowWriter::insert) is
/// its own transaction.
pub struct RowWriter {
    conn: Connection,
    insert_sql: String,
}

impl RowWriter {
    /// Append `rows` atomically. Returns the number of rows written.
    pub fn insert(&mut self, rows: &[SubhaloRecord]) -> rusqlite::Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare_cached(&self.insert_sql)?;
            for r in rows {
                stmt.execute(params![r.id, r.sfr, r.mass_log_msun, r.url])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: i64, mass: f64) -> SubhaloRecord {
        SubhaloRecord {
            id,
            sfr: 0.25,
            mass_log_msun: mass,
            url: format!("http://api/subhalos/{id}/"),
        }
    }

    #[test]
    fn table_name_format() {
        assert_eq!(table_name("TNG50-1", 99), "SHID_TNG50-1_99");
    }

    #[test]
    fn quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn create_insert_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("t.db"), "TNG50-1", 99).unwrap();
        assert_eq!(store.row_count().unwrap(), 0);

        let mut w = store.writer().unwrap();
        assert_eq!(w.insert(&[rec(2, 11.0), rec(1, 10.0)]).unwrap(), 2);
        assert_eq!(w.insert(&[]).unwrap(), 0);

        let rows = store.rows().unwrap();
        assert_eq!(rows, vec![rec(1, 10.0), rec(2, 11.0)]);
    }

    #[test]
    fn create_is_reusable_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let store = Store::create(&path, "TNG100-1", 50).unwrap();
        store.writer().unwrap().insert(&[rec(1, 10.0)]).unwrap();

        let again = Store::create(&path, "TNG100-1", 50).unwrap();
        again.writer().unwrap().insert(&[rec(1, 10.0)]).unwrap();
        // no uniqueness constraint: same id twice
        assert_eq!(again.row_count().unwrap(), 2);
    }

    #[test]
    fn tables_per_snapshot_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let a = Store::create(&path, "TNG50-1", 98).unwrap();
        let b = Store::create(&path, "TNG50-1", 99).unwrap();
        a.writer().unwrap().insert(&[rec(1, 10.0)]).unwrap();
        assert_eq!(a.row_count().unwrap(), 1);
        assert_eq!(b.row_count().unwrap(), 0);
    }

    #[test]
    fn concurrent_writers_do_not_lose_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("t.db"), "TNG50-1", 99).unwrap();
        std::thread::scope(|s| {
            for t in 0..4i64 {
                let store = &store;
                s.spawn(move || {
                    let mut w = store.writer().unwrap();
                    for batch in 0..10i64 {
                        let rows: Vec<_> = (0..25).map(|i| rec(t * 1000 + batch * 25 + i, 10.0)).collect();
                        w.insert(&rows).unwrap();
                    }
                });
            }
        });
        assert_eq!(store.row_count().unwrap(), 4 * 10 * 25);
    }
}
