//! The coordinator: runs every mutation as lock, validate, write.
//!
//! Each category has its own mutex. An operation holds the locks of every
//! category whose total it reads or changes from the moment it starts
//! validating until the store write has finished, so no two writers can both
//! fit into the same remaining balance. Moves between categories take both
//! locks in ascending id order.

mod locks;
mod phase;

pub use phase::Phase;

use rust_decimal::Decimal;
use std::path::Path;
use tracing::debug;

use crate::budget::{self, CategorySummary, DeleteNotice, DeletePolicy, Overview};
use crate::db::Database;
use crate::error::{LedgerError, Result};
use crate::models::{Category, Transaction, TransactionDetail};
use locks::CategoryLocks;
use phase::Mutation;

pub struct Ledger {
    db: Database,
    locks: CategoryLocks,
    delete_policy: DeletePolicy,
}

impl Ledger {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            locks: CategoryLocks::new(),
            delete_policy: DeletePolicy::default(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Database::open(path).map(Self::new)
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Hold the locks for `category_ids`, validate, then write.
    /// Nothing is written unless validation succeeds.
    fn run<D, T>(
        &self,
        mut mutation: Mutation,
        category_ids: &[i64],
        validate: impl FnOnce(&Database) -> Result<D>,
        commit: impl FnOnce(&Database, D) -> Result<T>,
    ) -> Result<T> {
        let locks = self.locks.set_for(category_ids);
        let _guards = locks.acquire();
        debug!(categories = ?locks.ids(), "category locks held");

        mutation.advance(Phase::Validating);
        let draft = validate(&self.db).map_err(|e| mutation.reject(e))?;

        mutation.advance(Phase::Committing);
        let value = commit(&self.db, draft).map_err(|e| mutation.reject(e))?;

        mutation.advance(Phase::Committed);
        debug_assert!(mutation.phase().is_terminal());
        Ok(value)
    }

    // ── Category mutations ────────────────────────────────────

    pub fn create_category(&self, name: &str, limit: Decimal) -> Result<Category> {
        // No id to lock yet; a concurrent duplicate name loses at the unique index.
        self.run(
            Mutation::begin("create_category"),
            &[],
            |db| budget::validate_create_category(db, name, limit),
            |db, draft| db.insert_category(&draft.name, draft.limit),
        )
    }

    pub fn update_category(&self, id: i64, name: &str, limit: Decimal) -> Result<Category> {
        self.run(
            Mutation::begin("update_category"),
            &[id],
            |db| budget::validate_update_category(db, id, name, limit),
            |db, draft| db.update_category(id, &draft.name, draft.limit),
        )
    }

    /// Delete a category and, under [`DeletePolicy::Cascade`], every
    /// transaction it owns. The notice reports how many went with it.
    pub fn delete_category(&self, id: i64) -> Result<DeleteNotice> {
        let policy = self.delete_policy;
        self.run(
            Mutation::begin("delete_category"),
            &[id],
            |db| budget::validate_delete_category(db, id, policy),
            |db, notice| {
                let removed = db.delete_category(notice.category_id)?;
                Ok(DeleteNotice {
                    transactions_removed: removed,
                    ..notice
                })
            },
        )
    }

    // ── Transaction mutations ─────────────────────────────────

    pub fn create_transaction(
        &self,
        description: &str,
        amount: Decimal,
        category_id: i64,
    ) -> Result<Transaction> {
        self.run(
            Mutation::begin("create_transaction"),
            &[category_id],
            |db| budget::validate_create_transaction(db, description, amount, category_id),
            |db, draft| db.insert_transaction(&draft.description, draft.amount, draft.category_id),
        )
    }

    /// Rewrite a transaction. When `category_id` differs from its current
    /// category this is a move, and both categories are locked.
    pub fn update_transaction(
        &self,
        id: i64,
        description: &str,
        amount: Decimal,
        category_id: i64,
    ) -> Result<Transaction> {
        let mut mutation = Mutation::begin("update_transaction");
        let seen = self.db.get_transaction(id).map_err(|e| mutation.reject(e))?;
        self.run(
            mutation,
            &[seen.category_id, category_id],
            |db| {
                ensure_unmoved(db, &seen)?;
                budget::validate_update_transaction(db, id, description, amount, category_id)
            },
            |db, draft| {
                db.update_transaction(id, &draft.description, draft.amount, draft.category_id)
            },
        )
    }

    pub fn delete_transaction(&self, id: i64) -> Result<()> {
        let mut mutation = Mutation::begin("delete_transaction");
        let seen = self.db.get_transaction(id).map_err(|e| mutation.reject(e))?;
        self.run(
            mutation,
            &[seen.category_id],
            |db| {
                ensure_unmoved(db, &seen)?;
                budget::validate_delete_transaction(db, id)
            },
            |db, ()| db.delete_transaction(id),
        )
    }

    // ── Reads ─────────────────────────────────────────────────

    pub fn category_summary(&self, id: i64) -> Result<CategorySummary> {
        let locks = self.locks.set_for(&[id]);
        let _guards = locks.acquire();
        let category = self.db.get_category(id)?;
        let amounts = self.db.category_amounts(id)?;
        Ok(budget::category_summary(category, &amounts))
    }

    /// Every category's summary in creation order, plus portfolio totals.
    pub fn list_category_summaries(&self) -> Result<Overview> {
        Ok(budget::overview(self.db.category_snapshot()?))
    }

    pub fn get_category(&self, id: i64) -> Result<Category> {
        self.db.get_category(id)
    }

    pub fn get_transaction(&self, id: i64) -> Result<Transaction> {
        self.db.get_transaction(id)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.db.list_categories()
    }

    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.db.list_transactions()
    }

    pub fn transaction_details(&self) -> Result<Vec<TransactionDetail>> {
        self.db.transaction_details()
    }

    pub fn transactions_for_category(&self, category_id: i64) -> Result<Vec<Transaction>> {
        self.db.get_category(category_id)?;
        self.db.transactions_for_category(category_id)
    }
}

/// The transaction was read before its category lock was taken; make sure it
/// still lives where the lock says it does.
fn ensure_unmoved(db: &Database, seen: &Transaction) -> Result<()> {
    let current = db.get_transaction(seen.id)?;
    if !current.belongs_to(seen.category_id) {
        return Err(LedgerError::Conflict(format!(
            "transaction {} was moved to another category concurrently",
            seen.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
