//! Budget arithmetic and the validators that gate every ledger mutation.
//!
//! Nothing here writes to the store. Each validator reads the current state,
//! checks the request against `spent <= limit`, and hands back the normalized
//! input the coordinator should write.

mod summary;

pub use summary::{category_summary, overview, CategorySummary, Overview, PortfolioTotals};

use rust_decimal::Decimal;
use tracing::debug;

use crate::db::Database;
use crate::error::{LedgerError, Result};
use crate::models::Category;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 255;
/// Money is tracked to the cent.
pub const MONEY_SCALE: u32 = 2;
/// Largest accepted amount or limit, in whole units. Keeps sums across any
/// realistic number of rows far inside `Decimal`'s range.
pub const MAX_MONEY: i64 = 1_000_000_000_000;

/// What to do when a category that still owns transactions is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Delete the transactions along with the category.
    #[default]
    Cascade,
    /// Refuse while any transaction remains.
    Block,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cascade" => Some(Self::Cascade),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated input for writing a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub limit: Decimal,
}

/// Validated input for writing a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub description: String,
    pub amount: Decimal,
    pub category_id: i64,
}

/// Side-channel notice for a category deletion: how many transactions go with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteNotice {
    pub category_id: i64,
    pub category_name: String,
    pub transactions_removed: usize,
}

impl DeleteNotice {
    pub fn cascaded(&self) -> bool {
        self.transactions_removed > 0
    }
}

// ── Aggregates ────────────────────────────────────────────────

/// Sum of every amount attributed to the category, read fresh from the store.
pub fn spent_total(db: &Database, category_id: i64) -> Result<Decimal> {
    Ok(total(&db.category_amounts(category_id)?))
}

pub fn remaining(db: &Database, category: &Category) -> Result<Decimal> {
    Ok(category.limit.saturating_sub(spent_total(db, category.id)?))
}

/// Sum of `amounts`. Rows written outside the ledger are not capped, so the
/// sum saturates instead of overflowing.
pub fn total(amounts: &[Decimal]) -> Decimal {
    amounts
        .iter()
        .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(*amount))
}

/// `spent / limit * 100`, or zero for a zero limit.
pub fn percent_used(spent: Decimal, limit: Decimal) -> Decimal {
    if limit.is_zero() {
        return Decimal::ZERO;
    }
    spent
        .checked_div(limit)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

// ── Category validators ───────────────────────────────────────

pub fn validate_create_category(db: &Database, name: &str, limit: Decimal) -> Result<CategoryDraft> {
    let name = clean_text(name, "Category name", MAX_NAME_LEN)?;
    let limit = check_money(limit, "Limit")?;

    if db.find_category_by_name(&name)?.is_some() {
        return Err(LedgerError::BusinessRule(format!(
            "A category named '{name}' already exists"
        )));
    }

    Ok(CategoryDraft { name, limit })
}

pub fn validate_update_category(
    db: &Database,
    id: i64,
    new_name: &str,
    new_limit: Decimal,
) -> Result<CategoryDraft> {
    let category = db.get_category(id)?;
    let name = clean_text(new_name, "Category name", MAX_NAME_LEN)?;
    let limit = check_money(new_limit, "Limit")?;

    let spent = spent_total(db, id)?;
    if limit < spent {
        return Err(LedgerError::BusinessRule(format!(
            "Limit {limit:.2} is below the {spent:.2} already spent in '{}'",
            category.name
        )));
    }

    if let Some(other) = db.find_category_by_name(&name)? {
        if other.id != id {
            return Err(LedgerError::BusinessRule(format!(
                "A category named '{name}' already exists"
            )));
        }
    }

    Ok(CategoryDraft { name, limit })
}

/// Deleting a category is allowed under `Cascade` even when it owns
/// transactions; the returned notice reports how many will be removed.
pub fn validate_delete_category(
    db: &Database,
    id: i64,
    policy: DeletePolicy,
) -> Result<DeleteNotice> {
    let category = db.get_category(id)?;
    let count = db.transaction_count(id)?;

    if policy == DeletePolicy::Block && count > 0 {
        return Err(LedgerError::BusinessRule(format!(
            "Category '{}' still has {count} transaction(s)",
            category.name
        )));
    }

    Ok(DeleteNotice {
        category_id: id,
        category_name: category.name,
        transactions_removed: count,
    })
}

// ── Transaction validators ────────────────────────────────────

pub fn validate_create_transaction(
    db: &Database,
    description: &str,
    amount: Decimal,
    category_id: i64,
) -> Result<TransactionDraft> {
    let description = clean_text(description, "Description", MAX_DESCRIPTION_LEN)?;
    let amount = check_money(amount, "Amount")?;
    let category = db.get_category(category_id)?;

    let available = remaining(db, &category)?;
    ensure_fits(amount, available, &category)?;

    Ok(TransactionDraft {
        description,
        amount,
        category_id,
    })
}

/// Validate rewriting a transaction, possibly into another category.
///
/// Within the same category the transaction's old amount is excluded before
/// the new one is counted. When the category changes, the source only loses
/// the transaction, so only the target needs room for the new amount.
pub fn validate_update_transaction(
    db: &Database,
    id: i64,
    description: &str,
    new_amount: Decimal,
    new_category_id: i64,
) -> Result<TransactionDraft> {
    let current = db.get_transaction(id)?;
    let description = clean_text(description, "Description", MAX_DESCRIPTION_LEN)?;
    let amount = check_money(new_amount, "Amount")?;
    let target = db.get_category(new_category_id)?;

    let spent = spent_total(db, target.id)?;
    let available = if current.belongs_to(target.id) {
        target.limit.saturating_sub(spent.saturating_sub(current.amount))
    } else {
        target.limit.saturating_sub(spent)
    };
    ensure_fits(amount, available, &target)?;

    debug!(
        id,
        from = current.category_id,
        to = target.id,
        %amount,
        %available,
        "transaction update fits"
    );

    Ok(TransactionDraft {
        description,
        amount,
        category_id: target.id,
    })
}

pub fn validate_delete_transaction(db: &Database, id: i64) -> Result<()> {
    db.get_transaction(id).map(|_| ())
}

// ── Helpers ───────────────────────────────────────────────────

/// `amount == available` fits.
fn ensure_fits(amount: Decimal, available: Decimal, category: &Category) -> Result<()> {
    if amount > available {
        return Err(LedgerError::BusinessRule(format!(
            "Amount {amount:.2} exceeds the remaining balance of {available:.2} in '{}'",
            category.name
        )));
    }
    Ok(())
}

fn clean_text(value: &str, field: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(LedgerError::Validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn check_money(value: Decimal, field: &str) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "{field} must be greater than zero"
        )));
    }
    if value > Decimal::from(MAX_MONEY) {
        return Err(LedgerError::Validation(format!(
            "{field} cannot exceed {MAX_MONEY}"
        )));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::Validation(format!(
            "{field} cannot have more than {MONEY_SCALE} decimal places"
        )));
    }
    Ok(value)
}
