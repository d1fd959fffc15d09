//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Engines consume loaded records — they never execute SQL directly.

use crate::{
    error::{InsightError, InsightResult},
    transaction::Transaction,
    types::CustomerId,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::HashSet;

/// Columns the analytics engines depend on. Checked before every full
/// load so a schema drift surfaces as a Schema error, not a row error.
const REQUIRED_COLUMNS: &[&str] = &[
    "InvoiceNo",
    "StockCode",
    "Description",
    "Quantity",
    "InvoiceDate",
    "UnitPrice",
    "CustomerID",
    "Country",
    "TotalPrice",
];

/// Result of a full history scan. Rows that could not be used are
/// dropped locally but counted, never silently vanished.
#[derive(Debug)]
pub struct TransactionLoad {
    pub transactions:       Vec<Transaction>,
    pub discarded_dates:    usize,
    pub discarded_customers: usize,
}

/// One catalog row for the recommendation engine, in insertion order.
/// Deduplication by stock code happens inside `fit`.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub stock_code:  String,
    pub description: Option<String>,
    pub unit_price:  f64,
}

pub struct InsightStore {
    conn: Connection,
}

impl InsightStore {
    pub fn open(path: &str) -> InsightResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only matters for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> InsightResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> InsightResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_transactions.sql"))?;
        Ok(())
    }

    // ── Writes ─────────────────────────────────────────────────

    /// Insert a batch of line items inside one SQL transaction.
    /// All-or-nothing: if any row fails, the whole batch rolls back
    /// and the error propagates to the caller.
    pub fn append_transactions(&self, rows: &[Transaction]) -> InsightResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (
                    InvoiceNo, StockCode, Description, Quantity, InvoiceDate,
                    UnitPrice, CustomerID, Country, TotalPrice
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.invoice_no,
                    row.stock_code,
                    row.description.as_deref(),
                    row.quantity,
                    row.invoice_date.format("%Y-%m-%d").to_string(),
                    row.unit_price,
                    row.customer_id,
                    row.country,
                    row.total_price,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("appended {} transaction rows", rows.len());
        Ok(())
    }

    // ── Reads ──────────────────────────────────────────────────

    /// Full history scan. Coerces InvoiceDate to a date, discarding
    /// (and counting) rows whose date fails every known format, and
    /// rows with no customer identifier. Missing Country is filled
    /// with "Unknown".
    pub fn load_all_transactions(&self) -> InsightResult<TransactionLoad> {
        self.check_schema()?;

        let mut stmt = self.conn.prepare(
            "SELECT InvoiceNo, StockCode, Description, Quantity, InvoiceDate,
                    UnitPrice, CustomerID, Country, TotalPrice
             FROM transactions ORDER BY id ASC",
        )?;

        let mut transactions = Vec::new();
        let mut discarded_dates = 0usize;
        let mut discarded_customers = 0usize;

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let date_raw: String = row.get(4)?;
            let Some(invoice_date) = parse_invoice_date(&date_raw) else {
                discarded_dates += 1;
                continue;
            };
            let Some(customer_id) = row.get::<_, Option<CustomerId>>(6)? else {
                discarded_customers += 1;
                continue;
            };
            transactions.push(Transaction {
                invoice_no:   row.get(0)?,
                stock_code:   row.get(1)?,
                description:  row.get(2)?,
                quantity:     row.get(3)?,
                invoice_date,
                unit_price:   row.get(5)?,
                customer_id,
                country:      row
                    .get::<_, Option<String>>(7)?
                    .unwrap_or_else(|| "Unknown".to_string()),
                total_price:  row.get(8)?,
            });
        }

        if discarded_dates > 0 {
            log::warn!("discarded {discarded_dates} rows with unparseable InvoiceDate");
        }
        if discarded_customers > 0 {
            log::warn!("discarded {discarded_customers} rows with no CustomerID");
        }
        log::info!("loaded {} transaction rows", transactions.len());

        Ok(TransactionLoad {
            transactions,
            discarded_dates,
            discarded_customers,
        })
    }

    /// Catalog rows for the recommendation engine, in insertion order.
    pub fn catalog_rows(&self) -> InsightResult<Vec<CatalogRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT StockCode, Description, UnitPrice FROM transactions ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CatalogRow {
                stock_code:  row.get(0)?,
                description: row.get(1)?,
                unit_price:  row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn check_schema(&self) -> InsightResult<()> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(transactions)")?;
        let present: HashSet<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        for column in REQUIRED_COLUMNS {
            if !present.contains(*column) {
                return Err(InsightError::Schema {
                    column: (*column).to_string(),
                });
            }
        }
        Ok(())
    }

    // ── Test helper methods ────────────────────────────────────

    pub fn transaction_count(&self) -> InsightResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn transaction_count_for_customer(&self, customer_id: CustomerId) -> InsightResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM transactions WHERE CustomerID = ?1",
                params![customer_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Insert one raw row, bypassing the typed model. Used in tests to
    /// seed malformed data (bad dates, null customers).
    pub fn insert_raw_row(
        &self,
        invoice_no: &str,
        stock_code: &str,
        description: Option<&str>,
        quantity: i64,
        invoice_date: &str,
        unit_price: f64,
        customer_id: Option<CustomerId>,
        country: Option<&str>,
        total_price: f64,
    ) -> InsightResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (
                InvoiceNo, StockCode, Description, Quantity, InvoiceDate,
                UnitPrice, CustomerID, Country, TotalPrice
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                invoice_no,
                stock_code,
                description,
                quantity,
                invoice_date,
                unit_price,
                customer_id,
                country,
                total_price,
            ],
        )?;
        Ok(())
    }
}

/// Try the ISO format first, then the day-first formats common in
/// retail exports.
fn parse_invoice_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M", "%d/%m/%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
