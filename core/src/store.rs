//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Detectors call store methods — they never execute SQL directly.
//! Every fetch excludes soft-deleted rows.

use rusqlite::{params, Connection, Row};

use crate::{
    error::EngineResult,
    model::{Document, Transaction, TxnType},
    types::DateRange,
};

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

fn txn_row_mapper(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let txn_type: String = row.get(4)?;
    Ok(Transaction {
        id: row.get(0)?,
        client_id: row.get(1)?,
        date: row.get(2)?,
        amount: row.get(3)?,
        txn_type: if txn_type == "credit" {
            TxnType::Credit
        } else {
            TxnType::Debit
        },
        vendor: row.get(5)?,
        description: row.get(6)?,
        ledger: row.get(7)?,
        invoice_number: row.get(8)?,
        gstin: row.get(9)?,
        mode: row.get(10)?,
        gst_applicable: row.get::<_, i32>(11)? != 0,
        gst_rate: row.get(12)?,
    })
}

const TXN_COLUMNS: &str = "txn_id, client_id, txn_date, amount, txn_type, vendor, description,
                           ledger, invoice_number, gstin, mode, gst_applicable, gst_rate";

impl LedgerStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> EngineResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    // ── Writes ─────────────────────────────────────────────────

    pub fn insert_transaction(&self, t: &Transaction) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (
                txn_id, client_id, txn_date, amount, txn_type, vendor, description,
                ledger, invoice_number, gstin, mode, gst_applicable, gst_rate
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                t.id,
                t.client_id,
                t.date,
                t.amount,
                t.txn_type.as_str(),
                t.vendor,
                t.description,
                t.ledger,
                t.invoice_number,
                t.gstin,
                t.mode,
                if t.gst_applicable { 1 } else { 0 },
                t.gst_rate,
            ],
        )?;
        Ok(())
    }

    pub fn insert_document(&self, d: &Document) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO documents (doc_id, client_id, file_type, folder_category, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                d.id,
                d.client_id,
                d.file_type,
                d.folder_category,
                d.metadata.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Soft delete: the row stays but becomes invisible to every fetch.
    pub fn soft_delete_transaction(&self, txn_id: &str, when: &str) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE transactions SET deleted_at = ?1 WHERE txn_id = ?2",
            params![when, txn_id],
        )?;
        Ok(())
    }

    // ── Range fetches ──────────────────────────────────────────

    pub fn transactions_in_range(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE client_id = ?1 AND txn_date >= ?2 AND txn_date <= ?3
               AND deleted_at IS NULL
             ORDER BY txn_date ASC, txn_id ASC"
        ))?;
        let rows = stmt.query_map(params![client_id, range.from, range.to], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn debit_transactions_in_range(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE client_id = ?1 AND txn_date >= ?2 AND txn_date <= ?3
               AND txn_type = 'debit' AND deleted_at IS NULL
             ORDER BY txn_date ASC, txn_id ASC"
        ))?;
        let rows = stmt.query_map(params![client_id, range.from, range.to], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn cash_transactions_in_range(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE client_id = ?1 AND txn_date >= ?2 AND txn_date <= ?3
               AND UPPER(TRIM(COALESCE(mode, ''))) = 'CASH' AND deleted_at IS NULL
             ORDER BY txn_date ASC, txn_id ASC"
        ))?;
        let rows = stmt.query_map(params![client_id, range.from, range.to], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn cash_debits_in_range(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE client_id = ?1 AND txn_date >= ?2 AND txn_date <= ?3
               AND txn_type = 'debit'
               AND UPPER(TRIM(COALESCE(mode, ''))) = 'CASH' AND deleted_at IS NULL
             ORDER BY txn_date ASC, txn_id ASC"
        ))?;
        let rows = stmt.query_map(params![client_id, range.from, range.to], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn gst_applicable_in_range(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE client_id = ?1 AND txn_date >= ?2 AND txn_date <= ?3
               AND gst_applicable = 1 AND deleted_at IS NULL
             ORDER BY txn_date ASC, txn_id ASC"
        ))?;
        let rows = stmt.query_map(params![client_id, range.from, range.to], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn gst_debits_in_range(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE client_id = ?1 AND txn_date >= ?2 AND txn_date <= ?3
               AND txn_type = 'debit' AND gst_applicable = 1 AND deleted_at IS NULL
             ORDER BY txn_date ASC, txn_id ASC"
        ))?;
        let rows = stmt.query_map(params![client_id, range.from, range.to], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Does the vendor have any non-deleted transaction inside the window?
    /// Used to verify a predicted-but-missing recurring payment.
    pub fn vendor_has_transaction_in_range(
        &self,
        client_id: &str,
        vendor: &str,
        range: DateRange,
    ) -> EngineResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions
             WHERE client_id = ?1 AND vendor = ?2
               AND txn_date >= ?3 AND txn_date <= ?4 AND deleted_at IS NULL",
            params![client_id, vendor, range.from, range.to],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn documents_for_client(&self, client_id: &str) -> EngineResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_id, client_id, file_type, folder_category, metadata
             FROM documents
             WHERE client_id = ?1 AND deleted_at IS NULL
             ORDER BY doc_id ASC",
        )?;
        let rows = stmt.query_map(params![client_id], |row| {
            let raw: String = row.get(4)?;
            Ok(Document {
                id: row.get(0)?,
                client_id: row.get(1)?,
                file_type: row.get(2)?,
                folder_category: row.get(3)?,
                // Malformed metadata degrades to an empty object, not a failed scan.
                metadata: serde_json::from_str(&raw).unwrap_or(serde_json::json!({})),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Test helpers ───────────────────────────────────────────

    pub fn transaction_count(&self, client_id: &str) -> EngineResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM transactions
                 WHERE client_id = ?1 AND deleted_at IS NULL",
                params![client_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}
