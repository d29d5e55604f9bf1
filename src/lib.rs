//! Budget ledger: categories with spending limits, and the transactions that
//! spend against them.
//!
//! [`Ledger`] is the entry point. Every mutation goes through it, and it
//! guarantees that after each committed operation no category has spent more
//! than its limit, even with many threads writing at once.

pub mod budget;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;

pub use budget::{CategorySummary, DeleteNotice, DeletePolicy, Overview, PortfolioTotals};
pub use db::Database;
pub use error::{EntityKind, LedgerError, Result};
pub use ledger::{Ledger, Phase};
pub use models::{Category, Transaction, TransactionDetail};
