use thiserror::Error;

/// The two record kinds held by the ledger store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Category,
    Transaction,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Transaction => "Transaction",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every way a ledger operation can be refused or fail.
///
/// A returned error always means the store was left exactly as it was before
/// the call.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input: empty name, non-positive or over-precise amount.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// Well-formed input that would break the budget invariant or name uniqueness.
    #[error("{0}")]
    BusinessRule(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },
    /// A concurrent writer won a race the validator could not see.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl LedgerError {
    pub fn category_not_found(id: i64) -> Self {
        Self::NotFound {
            kind: EntityKind::Category,
            id,
        }
    }

    pub fn transaction_not_found(id: i64) -> Self {
        Self::NotFound {
            kind: EntityKind::Transaction,
            id,
        }
    }

    /// True for the errors a caller should surface as a refused request rather
    /// than an internal failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
