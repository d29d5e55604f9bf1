mod category;
mod transaction;

pub use category::Category;
pub use transaction::{Transaction, TransactionDetail};

use chrono::{SecondsFormat, Utc};

/// Current time as a fixed-width RFC 3339 UTC string.
///
/// Fixed width keeps lexical order equal to chronological order, which the
/// store relies on for `ORDER BY created_at`.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
