//! Record persistence: a single-table SQLite store plus an in-memory
//! alternative.
//!
//! The store is deliberately thin. It owns one table of payroll records,
//! indexed by employee and period, and exposes exactly the operations the
//! surrounding service needs: batch insert after evaluation, period and
//! single-record lookup for the spike rule, listing, counting, and the
//! administrative bulk clear. Persisted records are never mutated in place;
//! period correction happens in memory before the first insert.

use crate::engine::HistoryLookup;
use crate::error::AuditError;
use crate::record::PayrollRecord;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// SQLite-backed payroll record store.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn };
        store.configure()?;
        store.ensure_schema()?;
        debug!("record store ready: {}", path.as_ref().display());
        Ok(store)
    }

    /// Open a private in-memory store. Used in tests and dry runs.
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    // WAL only applies to file-backed databases; the in-memory store skips it.
    fn configure(&self) -> Result<(), AuditError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    fn ensure_schema(&self) -> Result<(), AuditError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS payroll_records (
              id           INTEGER PRIMARY KEY AUTOINCREMENT,
              personel_ad  TEXT NOT NULL,
              donem        TEXT NOT NULL,
              maas         REAL NOT NULL DEFAULT 0.0,
              mesai        REAL NOT NULL DEFAULT 0.0,
              mesai_saati  REAL NOT NULL DEFAULT 0.0,
              ek           REAL NOT NULL DEFAULT 0.0,
              yardim       REAL NOT NULL DEFAULT 0.0,
              bes          REAL NOT NULL DEFAULT 0.0,
              avans        REAL NOT NULL DEFAULT 0.0,
              icra         REAL NOT NULL DEFAULT 0.0,
              borc         REAL NOT NULL DEFAULT 0.0,
              banka        REAL NOT NULL DEFAULT 0.0,
              kasa         REAL NOT NULL DEFAULT 0.0
            );

            CREATE INDEX IF NOT EXISTS idx_payroll_personel
              ON payroll_records(personel_ad);
            CREATE INDEX IF NOT EXISTS idx_payroll_donem
              ON payroll_records(donem);
            CREATE INDEX IF NOT EXISTS idx_payroll_personel_donem
              ON payroll_records(personel_ad, donem);
            ",
        )?;
        Ok(())
    }

    /// Insert a whole document's records in one transaction.
    ///
    /// Returns the number of rows inserted.
    pub fn insert_batch(&mut self, records: &[PayrollRecord]) -> Result<usize, AuditError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO payroll_records
                 (personel_ad, donem, maas, mesai, mesai_saati, ek, yardim,
                  bes, avans, icra, borc, banka, kasa)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.personel_ad,
                    record.donem,
                    record.maas,
                    record.mesai,
                    record.mesai_saati,
                    record.ek,
                    record.yardim,
                    record.bes,
                    record.avans,
                    record.icra,
                    record.borc,
                    record.banka,
                    record.kasa,
                ])?;
            }
        }
        tx.commit()?;
        info!(records = records.len(), "batch inserted");
        Ok(records.len())
    }

    /// All stored records, in insertion order.
    pub fn list_all(&self) -> Result<Vec<PayrollRecord>, AuditError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM payroll_records ORDER BY id"
        ))?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<i64, AuditError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM payroll_records", [], |row| {
                row.get(0)
            })?)
    }

    /// Delete every record. Returns the number of rows removed.
    pub fn clear_all(&self) -> Result<usize, AuditError> {
        let removed = self.conn.execute("DELETE FROM payroll_records", [])?;
        info!(records = removed, "store cleared");
        Ok(removed)
    }
}

const COLUMNS: &str = "personel_ad, donem, maas, mesai, mesai_saati, ek, yardim, \
                       bes, avans, icra, borc, banka, kasa";

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<PayrollRecord, rusqlite::Error> {
    Ok(PayrollRecord {
        personel_ad: row.get(0)?,
        donem: row.get(1)?,
        maas: row.get(2)?,
        mesai: row.get(3)?,
        mesai_saati: row.get(4)?,
        ek: row.get(5)?,
        yardim: row.get(6)?,
        bes: row.get(7)?,
        avans: row.get(8)?,
        icra: row.get(9)?,
        borc: row.get(10)?,
        banka: row.get(11)?,
        kasa: row.get(12)?,
    })
}

impl HistoryLookup for RecordStore {
    fn find_record(
        &self,
        personel_ad: &str,
        donem: NaiveDate,
    ) -> Result<Option<PayrollRecord>, AuditError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM payroll_records
             WHERE personel_ad = ?1 AND donem = ?2
             ORDER BY id LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![personel_ad, donem], row_to_record)?;
        rows.next().transpose().map_err(AuditError::from)
    }

    fn find_period(&self, donem: NaiveDate) -> Result<Vec<PayrollRecord>, AuditError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM payroll_records WHERE donem = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![donem], row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// In-memory history for callers without a database (tests, one-shot
/// evaluations against an already-fetched record set).
#[derive(Debug, Default)]
pub struct MemoryHistory {
    by_period: HashMap<NaiveDate, Vec<PayrollRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: PayrollRecord) {
        self.by_period.entry(record.donem).or_default().push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = PayrollRecord>) {
        for record in records {
            self.insert(record);
        }
    }
}

impl HistoryLookup for MemoryHistory {
    fn find_record(
        &self,
        personel_ad: &str,
        donem: NaiveDate,
    ) -> Result<Option<PayrollRecord>, AuditError> {
        Ok(self
            .by_period
            .get(&donem)
            .and_then(|records| records.iter().find(|r| r.personel_ad == personel_ad))
            .cloned())
    }

    fn find_period(&self, donem: NaiveDate) -> Result<Vec<PayrollRecord>, AuditError> {
        Ok(self.by_period.get(&donem).cloned().unwrap_or_default())
    }
}
