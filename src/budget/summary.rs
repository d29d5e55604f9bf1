use rust_decimal::Decimal;

use super::{percent_used, total};
use crate::models::Category;

/// A category with its derived totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: Category,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percent_used: Decimal,
    pub transaction_count: usize,
}

impl CategorySummary {
    pub fn limit(&self) -> Decimal {
        self.category.limit
    }
}

/// Totals across every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortfolioTotals {
    pub limit: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
}

impl PortfolioTotals {
    pub fn from_summaries(summaries: &[CategorySummary]) -> Self {
        summaries.iter().fold(Self::default(), |acc, s| Self {
            limit: acc.limit.saturating_add(s.category.limit),
            spent: acc.spent.saturating_add(s.spent),
            remaining: acc.remaining.saturating_add(s.remaining),
        })
    }

    pub fn percent_used(&self) -> Decimal {
        percent_used(self.spent, self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    pub categories: Vec<CategorySummary>,
    pub totals: PortfolioTotals,
}

pub fn category_summary(category: Category, amounts: &[Decimal]) -> CategorySummary {
    let spent = total(amounts);
    CategorySummary {
        remaining: category.limit.saturating_sub(spent),
        percent_used: percent_used(spent, category.limit),
        transaction_count: amounts.len(),
        spent,
        category,
    }
}

pub fn overview(snapshot: Vec<(Category, Vec<Decimal>)>) -> Overview {
    let categories: Vec<CategorySummary> = snapshot
        .into_iter()
        .map(|(category, amounts)| category_summary(category, &amounts))
        .collect();
    let totals = PortfolioTotals::from_summaries(&categories);
    Overview { categories, totals }
}
