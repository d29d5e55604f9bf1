use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: i64,
    pub description: String,
    pub amount: Decimal,
    pub category_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Transaction {
    pub fn belongs_to(&self, category_id: i64) -> bool {
        self.category_id == category_id
    }
}

/// A transaction paired with the name of the category that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub category_name: String,
}
