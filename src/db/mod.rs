mod schema;

use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::models::{timestamp_now, Category, Transaction, TransactionDetail};

const CATEGORY_COLUMNS: &str = "id, name, limit_amount, created_at, updated_at";
const TRANSACTION_COLUMNS: &str = "id, description, amount, category_id, created_at, updated_at";

/// SQLite-backed store for categories and their transactions.
///
/// The connection sits behind a mutex held only for the duration of a single
/// call, so the store can be shared between threads. Every call that touches
/// more than one row runs inside one SQL transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        info!(path = %path.display(), "opened ledger database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // The guarded connection has no invariant a panicking holder could break.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let mut conn = self.conn();

        // Check if schema_version table exists
        let has_version_table: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database - apply full schema
            let tx = conn.transaction()?;
            tx.execute_batch(schema::SCHEMA_V1)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            tx.commit()?;
            return Ok(());
        }

        // Existing database - check version and apply migrations
        let current: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── Categories ────────────────────────────────────────────

    pub fn get_category(&self, id: i64) -> Result<Category> {
        query_category(&self.conn(), id)
    }

    pub fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let result = self.conn().query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1"),
            params![name],
            category_from_row,
        );
        match result {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All categories in creation order.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id"))?;
        let rows = stmt.query_map([], category_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn insert_category(&self, name: &str, limit: Decimal) -> Result<Category> {
        let now = timestamp_now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO categories (name, limit_amount, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![name, limit.to_string(), now],
        )
        .map_err(|e| name_conflict(e, name))?;
        let id = conn.last_insert_rowid();
        debug!(id, name, %limit, "inserted category");
        Ok(Category {
            id,
            name: name.to_string(),
            limit,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn update_category(&self, id: i64, name: &str, limit: Decimal) -> Result<Category> {
        let now = timestamp_now();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let changed = tx
            .execute(
                "UPDATE categories SET name = ?1, limit_amount = ?2, updated_at = ?3 WHERE id = ?4",
                params![name, limit.to_string(), now, id],
            )
            .map_err(|e| name_conflict(e, name))?;
        if changed == 0 {
            return Err(LedgerError::category_not_found(id));
        }
        let category = query_category(&tx, id)?;
        tx.commit()?;
        debug!(id, name, %limit, "updated category");
        Ok(category)
    }

    /// Delete a category together with every transaction it owns.
    /// Returns how many transactions were removed.
    pub fn delete_category(&self, id: i64) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM transactions WHERE category_id = ?1",
            params![id],
        )?;
        let deleted = tx.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(LedgerError::category_not_found(id));
        }
        tx.commit()?;
        debug!(id, removed, "deleted category");
        Ok(removed)
    }

    // ── Transactions ──────────────────────────────────────────

    pub fn get_transaction(&self, id: i64) -> Result<Transaction> {
        query_transaction(&self.conn(), id)
    }

    /// All transactions, newest first.
    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], transaction_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Transactions owned by one category, newest first.
    pub fn transactions_for_category(&self, category_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE category_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![category_id], transaction_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// All transactions with their category name, newest first.
    pub fn transaction_details(&self) -> Result<Vec<TransactionDetail>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.description, t.amount, t.category_id, t.created_at, t.updated_at, c.name
             FROM transactions t JOIN categories c ON t.category_id = c.id
             ORDER BY t.created_at DESC, t.id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TransactionDetail {
                transaction: transaction_from_row(row)?,
                category_name: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn insert_transaction(
        &self,
        description: &str,
        amount: Decimal,
        category_id: i64,
    ) -> Result<Transaction> {
        let now = timestamp_now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO transactions (description, amount, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![description, amount.to_string(), category_id, now],
        )
        .map_err(|e| missing_category(e, category_id))?;
        let id = conn.last_insert_rowid();
        debug!(id, category_id, %amount, "inserted transaction");
        Ok(Transaction {
            id,
            description: description.to_string(),
            amount,
            category_id,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Rewrite a transaction in place. Changing `category_id` moves it between
    /// categories in the same statement, so both categories' totals change
    /// together.
    pub fn update_transaction(
        &self,
        id: i64,
        description: &str,
        amount: Decimal,
        category_id: i64,
    ) -> Result<Transaction> {
        let now = timestamp_now();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let changed = tx
            .execute(
                "UPDATE transactions
                 SET description = ?1, amount = ?2, category_id = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![description, amount.to_string(), category_id, now, id],
            )
            .map_err(|e| missing_category(e, category_id))?;
        if changed == 0 {
            return Err(LedgerError::transaction_not_found(id));
        }
        let txn = query_transaction(&tx, id)?;
        tx.commit()?;
        debug!(id, category_id, %amount, "updated transaction");
        Ok(txn)
    }

    pub fn delete_transaction(&self, id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(LedgerError::transaction_not_found(id));
        }
        debug!(id, "deleted transaction");
        Ok(())
    }

    // ── Aggregate inputs ──────────────────────────────────────

    /// Every amount currently attributed to a category.
    pub fn category_amounts(&self, category_id: i64) -> Result<Vec<Decimal>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT amount FROM transactions WHERE category_id = ?1")?;
        let rows = stmt.query_map(params![category_id], |row| decimal_at(row, 0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn transaction_count(&self, category_id: i64) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM transactions WHERE category_id = ?1",
            params![category_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Every category with its transaction amounts, read under one lock so the
    /// result reflects a single point in time.
    pub fn category_snapshot(&self) -> Result<Vec<(Category, Vec<Decimal>)>> {
        let conn = self.conn();

        let mut stmt =
            conn.prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id"))?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare("SELECT category_id, amount FROM transactions")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, decimal_at(row, 1)?)))?;
        let mut amounts: HashMap<i64, Vec<Decimal>> = HashMap::new();
        for row in rows {
            let (category_id, amount) = row?;
            amounts.entry(category_id).or_default().push(amount);
        }

        Ok(categories
            .into_iter()
            .map(|c| {
                let owned = amounts.remove(&c.id).unwrap_or_default();
                (c, owned)
            })
            .collect())
    }
}

fn query_category(conn: &Connection, id: i64) -> Result<Category> {
    let result = conn.query_row(
        &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
        params![id],
        category_from_row,
    );
    match result {
        Ok(c) => Ok(c),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(LedgerError::category_not_found(id)),
        Err(e) => Err(e.into()),
    }
}

fn query_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let result = conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
        params![id],
        transaction_from_row,
    );
    match result {
        Ok(t) => Ok(t),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(LedgerError::transaction_not_found(id)),
        Err(e) => Err(e.into()),
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        limit: decimal_at(row, 2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        description: row.get(1)?,
        amount: decimal_at(row, 2)?,
        category_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Amounts are stored as TEXT; a value that no longer parses is an error,
/// never a silent zero.
fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn violates(err: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(f, _) if f.extended_code == extended_code)
}

fn name_conflict(err: rusqlite::Error, name: &str) -> LedgerError {
    if violates(&err, ffi::SQLITE_CONSTRAINT_UNIQUE) {
        LedgerError::Conflict(format!("a category named '{name}' already exists"))
    } else {
        err.into()
    }
}

fn missing_category(err: rusqlite::Error, category_id: i64) -> LedgerError {
    if violates(&err, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
        LedgerError::category_not_found(category_id)
    } else {
        err.into()
    }
}
